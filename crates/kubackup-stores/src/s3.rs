//! S3 backend using the `aws` CLI
//!
//! Uploads go through `aws s3 cp`, listings through
//! `aws s3api list-objects-v2` (the CLI follows continuation tokens itself),
//! deletes through `aws s3 rm`. S3-compatible stores are reached by setting
//! `endpoint_url`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::command;
use crate::error::{Result, StoreError};
use crate::traits::StorageBackend;
use crate::types::*;

/// S3 storage backend
pub struct S3Backend {
    name: String,
    config: S3Config,
}

/// Subset of the `list-objects-v2` response we care about
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListObjectsOutput {
    #[serde(default)]
    contents: Option<Vec<S3Object>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct S3Object {
    key: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    last_modified: Option<DateTime<Utc>>,
}

impl S3Backend {
    /// Create a new S3 backend
    pub fn new(name: impl Into<String>, config: S3Config) -> Result<Self> {
        if config.bucket.trim().is_empty() {
            return Err(StoreError::ConfigurationError(
                "S3 bucket must not be empty".to_string(),
            ));
        }

        Ok(Self {
            name: name.into(),
            config,
        })
    }

    fn url(&self, key: &str) -> String {
        format!("s3://{}/{}", self.config.bucket, key.trim_start_matches('/'))
    }

    /// Arguments shared by every invocation
    fn global_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(endpoint) = &self.config.endpoint_url {
            args.push("--endpoint-url".to_string());
            args.push(endpoint.clone());
        }
        if let Some(region) = &self.config.region {
            args.push("--region".to_string());
            args.push(region.clone());
        }
        if let Some(profile) = &self.config.profile {
            args.push("--profile".to_string());
            args.push(profile.clone());
        }
        args
    }

    pub(crate) fn upload_args(&self, path: &Path, key: &str, options: &UploadOptions) -> Vec<String> {
        let mut args = vec![
            "s3".to_string(),
            "cp".to_string(),
            path.to_string_lossy().to_string(),
            self.url(key),
            "--only-show-errors".to_string(),
        ];

        if let Some(class) = &self.config.storage_class {
            args.push("--storage-class".to_string());
            args.push(class.clone());
        }

        if !options.metadata.is_empty() {
            let metadata = options
                .metadata
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(",");
            args.push("--metadata".to_string());
            args.push(metadata);
        }

        args.extend(self.global_args());
        args
    }

    pub(crate) fn list_args(&self, prefix: &str) -> Vec<String> {
        let mut args = vec![
            "s3api".to_string(),
            "list-objects-v2".to_string(),
            "--bucket".to_string(),
            self.config.bucket.clone(),
            "--prefix".to_string(),
            prefix.trim_start_matches('/').to_string(),
            "--output".to_string(),
            "json".to_string(),
        ];
        args.extend(self.global_args());
        args
    }

    pub(crate) fn delete_args(&self, key: &str) -> Vec<String> {
        let mut args = vec![
            "s3".to_string(),
            "rm".to_string(),
            self.url(key),
            "--only-show-errors".to_string(),
        ];
        args.extend(self.global_args());
        args
    }

    pub(crate) fn download_args(&self, key: &str, dest: &Path) -> Vec<String> {
        let mut args = vec![
            "s3".to_string(),
            "cp".to_string(),
            self.url(key),
            dest.to_string_lossy().to_string(),
            "--only-show-errors".to_string(),
        ];
        args.extend(self.global_args());
        args
    }

    /// Parse `list-objects-v2` JSON output
    pub(crate) fn parse_list_output(stdout: &str) -> Result<Vec<StoredObject>> {
        let trimmed = stdout.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(Vec::new());
        }

        let output: ListObjectsOutput =
            serde_json::from_str(trimmed).map_err(|e| StoreError::UnexpectedOutput {
                tool: "aws s3api list-objects-v2".to_string(),
                message: e.to_string(),
            })?;

        Ok(output
            .contents
            .unwrap_or_default()
            .into_iter()
            .map(|o| StoredObject {
                key: o.key,
                size: o.size,
                last_modified: o.last_modified,
            })
            .collect())
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    fn backend_type(&self) -> BackendType {
        BackendType::S3
    }

    fn is_available(&self) -> bool {
        which::which(&self.config.aws_cli).is_ok()
    }

    fn location(&self, key: &str) -> String {
        self.url(key)
    }

    #[instrument(skip(self, options), fields(destination = %self.name))]
    async fn upload(&self, path: &Path, key: &str, options: &UploadOptions) -> Result<UploadResult> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            StoreError::InvalidArtifact(format!("{}: {}", path.display(), e))
        })?;

        if options.dry_run {
            info!(location = %self.url(key), "dry run, skipping upload");
        } else {
            let args = self.upload_args(path, key, options);
            command::run(
                &self.config.aws_cli,
                &args,
                options.timeout.map(Duration::from_secs),
            )
            .await
            .map_err(|e| match e {
                StoreError::CommandFailed { message, .. } => StoreError::UploadFailed(message),
                other => other,
            })?;
            info!(location = %self.url(key), bytes = metadata.len(), "uploaded to S3");
        }

        Ok(UploadResult {
            destination: self.name.clone(),
            key: key.to_string(),
            location: self.url(key),
            size_bytes: metadata.len(),
            dry_run: options.dry_run,
            uploaded_at: Utc::now(),
        })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>> {
        let args = self.list_args(prefix);
        let output = command::run(&self.config.aws_cli, &args, None)
            .await
            .map_err(|e| match e {
                StoreError::CommandFailed { message, .. } => StoreError::ListFailed(message),
                other => other,
            })?;

        let objects = Self::parse_list_output(&output.stdout)?;
        debug!(prefix, count = objects.len(), "listed S3 objects");
        Ok(objects)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let args = self.delete_args(key);
        command::run(&self.config.aws_cli, &args, None)
            .await
            .map_err(|e| match e {
                StoreError::CommandFailed { message, .. } => StoreError::DeleteFailed {
                    key: key.to_string(),
                    message,
                },
                other => other,
            })?;
        info!(location = %self.url(key), "deleted from S3");
        Ok(())
    }

    async fn download(&self, key: &str, dest: &Path) -> Result<()> {
        let args = self.download_args(key, dest);
        command::run(&self.config.aws_cli, &args, None)
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

    fn backend(config: S3Config) -> S3Backend {
        S3Backend::new("primary", config).unwrap()
    }

    fn minio() -> S3Config {
        S3Config {
            bucket: "backups".to_string(),
            endpoint_url: Some("http://minio:9000".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_bucket_rejected() {
        assert!(S3Backend::new("primary", S3Config::default()).is_err());
    }

    #[test]
    fn test_upload_args() {
        let s3 = backend(S3Config {
            storage_class: Some("STANDARD_IA".to_string()),
            ..minio()
        });
        let options = UploadOptions::default()
            .with_metadata("target", "main-db")
            .with_metadata("sha256", "abc");

        let args = s3.upload_args(Path::new("/tmp/dump.sql.gz"), "kubackup/db/1.sql.gz", &options);
        assert_eq!(
            args,
            vec![
                "s3",
                "cp",
                "/tmp/dump.sql.gz",
                "s3://backups/kubackup/db/1.sql.gz",
                "--only-show-errors",
                "--storage-class",
                "STANDARD_IA",
                "--metadata",
                "sha256=abc,target=main-db",
                "--endpoint-url",
                "http://minio:9000",
            ]
        );
    }

    #[test]
    fn test_list_args() {
        let s3 = backend(S3Config {
            region: Some("eu-west-1".to_string()),
            profile: Some("backup".to_string()),
            ..minio()
        });
        let args = s3.list_args("/kubackup/default/");
        assert_eq!(&args[..6], &["s3api", "list-objects-v2", "--bucket", "backups", "--prefix", "kubackup/default/"]);
        assert!(args.windows(2).any(|w| w == ["--region", "eu-west-1"]));
        assert!(args.windows(2).any(|w| w == ["--profile", "backup"]));
    }

    #[test]
    fn test_delete_and_download_args() {
        let s3 = backend(minio());
        assert_eq!(s3.delete_args("a/b.tar")[2], "s3://backups/a/b.tar");
        let args = s3.download_args("a/b.tar", Path::new("out.tar"));
        assert_eq!(args[2], "s3://backups/a/b.tar");
        assert_eq!(args[3], "out.tar");
    }

    #[test]
    fn test_parse_list_output() {
        let stdout = r#"{
            "Contents": [
                {"Key": "kubackup/db/20240101T000000Z.sql.gz", "LastModified": "2024-01-01T00:00:05+00:00", "Size": 1024},
                {"Key": "kubackup/db/20240102T000000Z.sql.gz", "LastModified": "2024-01-02T00:00:05.000Z", "Size": 2048}
            ],
            "RequestCharged": null
        }"#;

        let objects = S3Backend::parse_list_output(stdout).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].key, "kubackup/db/20240101T000000Z.sql.gz");
        assert_eq!(objects[1].size, Some(2048));
        assert!(objects[1].last_modified.is_some());
    }

    #[test]
    fn test_parse_empty_list_output() {
        assert!(S3Backend::parse_list_output("").unwrap().is_empty());
        assert!(S3Backend::parse_list_output("{\"RequestCharged\": null}").unwrap().is_empty());
    }

    #[test]
    fn test_parse_garbage_list_output() {
        assert!(matches!(
            S3Backend::parse_list_output("not json"),
            Err(StoreError::UnexpectedOutput { .. })
        ));
    }

    #[tokio::test]
    async fn test_dry_run_upload_does_not_execute() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), b"dump").unwrap();

        let s3 = backend(S3Config {
            aws_cli: "kubackup-missing-aws".to_string(),
            ..minio()
        });
        let options = UploadOptions {
            dry_run: true,
            ..Default::default()
        };

        let result = s3.upload(temp.path(), "db/1.sql", &options).await.unwrap();
        assert!(result.dry_run);
        assert_eq!(result.size_bytes, 4);
        assert_eq!(result.location, "s3://backups/db/1.sql");
    }

    #[tokio::test]
    async fn test_upload_missing_artifact() {
        let s3 = backend(minio());
        let err = s3
            .upload(Path::new("/nonexistent/kubackup.sql"), "db/1.sql", &UploadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArtifact(_)));
    }
}
