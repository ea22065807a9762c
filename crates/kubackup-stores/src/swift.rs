//! OpenStack Swift backend using the `swift` CLI
//!
//! Authentication comes from the usual `OS_*` environment variables.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::command;
use crate::error::{Result, StoreError};
use crate::traits::StorageBackend;
use crate::types::*;

/// Swift storage backend
pub struct SwiftBackend {
    name: String,
    config: SwiftConfig,
}

impl SwiftBackend {
    /// Create a new Swift backend
    pub fn new(name: impl Into<String>, config: SwiftConfig) -> Result<Self> {
        if config.container.trim().is_empty() {
            return Err(StoreError::ConfigurationError(
                "Swift container must not be empty".to_string(),
            ));
        }

        Ok(Self {
            name: name.into(),
            config,
        })
    }

    pub(crate) fn upload_args(&self, path: &Path, key: &str, options: &UploadOptions) -> Vec<String> {
        let mut args = vec![
            "upload".to_string(),
            self.config.container.clone(),
            path.to_string_lossy().to_string(),
            "--object-name".to_string(),
            key.trim_start_matches('/').to_string(),
        ];

        if let Some(size) = self.config.segment_size {
            args.push("--segment-size".to_string());
            args.push(size.to_string());
        }

        for (k, v) in &options.metadata {
            args.push("--header".to_string());
            args.push(format!("X-Object-Meta-{}:{}", k, v));
        }

        args
    }

    pub(crate) fn list_args(&self, prefix: &str) -> Vec<String> {
        vec![
            "list".to_string(),
            self.config.container.clone(),
            "--prefix".to_string(),
            prefix.trim_start_matches('/').to_string(),
        ]
    }

    pub(crate) fn delete_args(&self, key: &str) -> Vec<String> {
        vec![
            "delete".to_string(),
            self.config.container.clone(),
            key.trim_start_matches('/').to_string(),
        ]
    }

    pub(crate) fn download_args(&self, key: &str, dest: &Path) -> Vec<String> {
        vec![
            "download".to_string(),
            self.config.container.clone(),
            key.trim_start_matches('/').to_string(),
            "--output".to_string(),
            dest.to_string_lossy().to_string(),
        ]
    }

    /// `swift list` prints one object name per line
    pub(crate) fn parse_list_output(stdout: &str) -> Vec<StoredObject> {
        stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(StoredObject::new)
            .collect()
    }
}

#[async_trait]
impl StorageBackend for SwiftBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Swift
    }

    fn is_available(&self) -> bool {
        which::which(&self.config.swift_cli).is_ok()
    }

    fn location(&self, key: &str) -> String {
        format!("swift://{}/{}", self.config.container, key.trim_start_matches('/'))
    }

    #[instrument(skip(self, options), fields(destination = %self.name))]
    async fn upload(&self, path: &Path, key: &str, options: &UploadOptions) -> Result<UploadResult> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            StoreError::InvalidArtifact(format!("{}: {}", path.display(), e))
        })?;

        if options.dry_run {
            info!(location = %self.location(key), "dry run, skipping upload");
        } else {
            let args = self.upload_args(path, key, options);
            command::run(
                &self.config.swift_cli,
                &args,
                options.timeout.map(Duration::from_secs),
            )
            .await
            .map_err(|e| match e {
                StoreError::CommandFailed { message, .. } => StoreError::UploadFailed(message),
                other => other,
            })?;
            info!(location = %self.location(key), bytes = metadata.len(), "uploaded to Swift");
        }

        Ok(UploadResult {
            destination: self.name.clone(),
            key: key.to_string(),
            location: self.location(key),
            size_bytes: metadata.len(),
            dry_run: options.dry_run,
            uploaded_at: Utc::now(),
        })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>> {
        let args = self.list_args(prefix);
        let output = command::run(&self.config.swift_cli, &args, None)
            .await
            .map_err(|e| match e {
                StoreError::CommandFailed { message, .. } => StoreError::ListFailed(message),
                other => other,
            })?;

        let objects = Self::parse_list_output(&output.stdout);
        debug!(prefix, count = objects.len(), "listed Swift objects");
        Ok(objects)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let args = self.delete_args(key);
        command::run(&self.config.swift_cli, &args, None)
            .await
            .map_err(|e| match e {
                StoreError::CommandFailed { message, .. } => StoreError::DeleteFailed {
                    key: key.to_string(),
                    message,
                },
                other => other,
            })?;
        info!(location = %self.location(key), "deleted from Swift");
        Ok(())
    }

    async fn download(&self, key: &str, dest: &Path) -> Result<()> {
        let args = self.download_args(key, dest);
        command::run(&self.config.swift_cli, &args, None)
            .await
            .map_err(|e| match e {
                StoreError::CommandFailed { message, .. } => StoreError::DownloadFailed {
                    key: key.to_string(),
                    message,
                },
                other => other,
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> SwiftBackend {
        SwiftBackend::new(
            "archive",
            SwiftConfig {
                container: "dumps".to_string(),
                segment_size: Some(1024),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_empty_container_rejected() {
        assert!(SwiftBackend::new("archive", SwiftConfig::default()).is_err());
    }

    #[test]
    fn test_upload_args() {
        let options = UploadOptions::default().with_metadata("Target", "zk");
        let args = backend().upload_args(Path::new("/work/zk.tar.gz"), "/kubackup/zk.tar.gz", &options);
        assert_eq!(
            args,
            vec![
                "upload",
                "dumps",
                "/work/zk.tar.gz",
                "--object-name",
                "kubackup/zk.tar.gz",
                "--segment-size",
                "1024",
                "--header",
                "X-Object-Meta-Target:zk",
            ]
        );
    }

    #[test]
    fn test_list_delete_download_args() {
        let swift = backend();
        assert_eq!(swift.list_args("kubackup/"), vec!["list", "dumps", "--prefix", "kubackup/"]);
        assert_eq!(swift.delete_args("kubackup/a"), vec!["delete", "dumps", "kubackup/a"]);
        assert_eq!(
            swift.download_args("kubackup/a", Path::new("a.out")),
            vec!["download", "dumps", "kubackup/a", "--output", "a.out"]
        );
    }

    #[test]
    fn test_location() {
        assert_eq!(backend().location("kubackup/a"), "swift://dumps/kubackup/a");
    }

    #[test]
    fn test_parse_list_output() {
        let objects = SwiftBackend::parse_list_output("kubackup/a.sql\n\n  kubackup/b.sql \n");
        assert_eq!(
            objects,
            vec![StoredObject::new("kubackup/a.sql"), StoredObject::new("kubackup/b.sql")]
        );
    }
}
