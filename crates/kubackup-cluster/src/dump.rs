//! Dump execution: exec, compress, checksum

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use flate2::write::GzEncoder;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use kubackup_core::{Compression, DumpError, Result};

use crate::client::{ClusterClient, ExecRequest};

/// A finished dump on local disk
#[derive(Debug, Clone, Serialize)]
pub struct DumpArtifact {
    pub path: PathBuf,
    /// Size of the file on disk (after compression)
    pub size_bytes: u64,
    /// Bytes produced by the dump command
    pub raw_bytes: u64,
    /// Hex SHA-256 of the file on disk
    pub sha256: String,
    pub compression: Compression,
    pub duration_ms: u64,
}

impl DumpArtifact {
    /// Delete the local file
    pub async fn remove(&self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove dump file");
            }
        }
    }
}

/// Runs dump commands in pods and stages the result in a work directory
pub struct DumpExecutor {
    client: Arc<dyn ClusterClient>,
    workdir: PathBuf,
    compression: Compression,
}

impl DumpExecutor {
    pub fn new(client: Arc<dyn ClusterClient>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            workdir: workdir.into(),
            compression: Compression::default(),
        }
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Run `exec` and store its output as `file_name` in the work directory
    #[instrument(skip(self, exec), fields(namespace = %exec.namespace, pod = %exec.pod))]
    pub async fn dump(&self, exec: &ExecRequest, file_name: &str) -> Result<DumpArtifact> {
        let started = Instant::now();
        tokio::fs::create_dir_all(&self.workdir)
            .await
            .map_err(DumpError::Io)?;

        let final_path = self.workdir.join(file_name);
        let raw_path = self.workdir.join(format!("{}.part", file_name));

        let outcome = match self.client.exec_to_file(exec, &raw_path).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let _ = tokio::fs::remove_file(&raw_path).await;
                return Err(e);
            }
        };
        if !outcome.stderr.is_empty() {
            debug!(stderr = %outcome.stderr, "dump stderr");
        }

        let raw_bytes = tokio::fs::metadata(&raw_path)
            .await
            .map_err(DumpError::Io)?
            .len();
        if raw_bytes == 0 {
            let _ = tokio::fs::remove_file(&raw_path).await;
            return Err(DumpError::EmptyOutput {
                pod: exec.pod.clone(),
            }
            .into());
        }

        let (sha256, size_bytes) = match self.seal(&raw_path, &final_path).await {
            Ok(sealed) => sealed,
            Err(e) => {
                // Neither the raw output nor a half-written final file may stay behind.
                let _ = tokio::fs::remove_file(&raw_path).await;
                let _ = tokio::fs::remove_file(&final_path).await;
                return Err(e);
            }
        };

        let artifact = DumpArtifact {
            path: final_path,
            size_bytes,
            raw_bytes,
            sha256,
            compression: self.compression,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            file = %artifact.path.display(),
            raw_bytes,
            size_bytes,
            compression = %self.compression,
            "dump staged"
        );
        Ok(artifact)
    }
}

impl DumpExecutor {
    /// Turn the raw output into the final file; returns its checksum and size
    async fn seal(&self, raw_path: &Path, final_path: &Path) -> Result<(String, u64)> {
        match self.compression {
            Compression::Gzip => {
                let (src, dest) = (raw_path.to_path_buf(), final_path.to_path_buf());
                tokio::task::spawn_blocking(move || gzip_file(&src, &dest))
                    .await
                    .map_err(|e| DumpError::CompressionFailed(e.to_string()))?
                    .map_err(|e| DumpError::CompressionFailed(e.to_string()))?;
                let _ = tokio::fs::remove_file(raw_path).await;
            }
            Compression::None => {
                tokio::fs::rename(raw_path, final_path)
                    .await
                    .map_err(DumpError::Io)?;
            }
        }

        let hashed = final_path.to_path_buf();
        let sha256 = tokio::task::spawn_blocking(move || sha256_file(&hashed))
            .await
            .map_err(|e| DumpError::Io(std::io::Error::other(e.to_string())))?
            .map_err(DumpError::Io)?;

        let size_bytes = tokio::fs::metadata(final_path)
            .await
            .map_err(DumpError::Io)?
            .len();
        Ok((sha256, size_bytes))
    }
}

fn gzip_file(src: &Path, dest: &Path) -> std::io::Result<()> {
    let mut reader = BufReader::new(File::open(src)?);
    let writer = BufWriter::new(File::create(dest)?);
    let mut encoder = GzEncoder::new(writer, flate2::Compression::default());
    std::io::copy(&mut reader, &mut encoder)?;
    encoder.finish()?.flush()?;
    Ok(())
}

/// Hex SHA-256 of a file
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClusterVersion, ExecOutcome};
    use crate::pod::Pod;
    use async_trait::async_trait;
    use flate2::read::GzDecoder;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Writes(&'static [u8]);

    #[async_trait]
    impl ClusterClient for Writes {
        async fn list_pods(&self, _namespace: &str, _selector: &str) -> Result<Vec<Pod>> {
            Ok(Vec::new())
        }

        async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
            Err(kubackup_core::ClusterError::PodNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            }
            .into())
        }

        async fn exec_to_file(&self, _exec: &ExecRequest, dest: &Path) -> Result<ExecOutcome> {
            std::fs::write(dest, self.0)?;
            Ok(ExecOutcome {
                bytes: self.0.len() as u64,
                stderr: String::new(),
            })
        }

        async fn version(&self) -> Result<ClusterVersion> {
            Ok(ClusterVersion::default())
        }
    }

    /// Leaves a directory where the raw dump should be, so reading it fails
    /// after the compressed file was already created
    struct WritesDirectory;

    #[async_trait]
    impl ClusterClient for WritesDirectory {
        async fn list_pods(&self, _namespace: &str, _selector: &str) -> Result<Vec<Pod>> {
            Ok(Vec::new())
        }

        async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
            Writes(b"").get_pod(namespace, name).await
        }

        async fn exec_to_file(&self, _exec: &ExecRequest, dest: &Path) -> Result<ExecOutcome> {
            std::fs::create_dir_all(dest)?;
            std::fs::write(dest.join("chunk"), b"data")?;
            Ok(ExecOutcome {
                bytes: 4,
                stderr: String::new(),
            })
        }

        async fn version(&self) -> Result<ClusterVersion> {
            Ok(ClusterVersion::default())
        }
    }

    fn request() -> ExecRequest {
        ExecRequest {
            namespace: "prod".to_string(),
            pod: "db-0".to_string(),
            container: None,
            command: "pg_dumpall".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_dump_gzip() {
        let temp = TempDir::new().unwrap();
        let executor = DumpExecutor::new(Arc::new(Writes(b"SELECT 1;\n")), temp.path());

        let artifact = executor.dump(&request(), "db.sql.gz").await.unwrap();
        assert_eq!(artifact.raw_bytes, 10);
        assert_eq!(artifact.compression, Compression::Gzip);
        assert!(!temp.path().join("db.sql.gz.part").exists());

        let mut decoded = String::new();
        GzDecoder::new(File::open(&artifact.path).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "SELECT 1;\n");
        assert_eq!(artifact.sha256, sha256_file(&artifact.path).unwrap());
    }

    #[tokio::test]
    async fn test_dump_uncompressed() {
        let temp = TempDir::new().unwrap();
        let executor = DumpExecutor::new(Arc::new(Writes(b"hello")), temp.path())
            .with_compression(Compression::None);

        let artifact = executor.dump(&request(), "snap.db").await.unwrap();
        assert_eq!(artifact.size_bytes, 5);
        assert_eq!(
            artifact.sha256,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );

        artifact.remove().await;
        assert!(!artifact.path.exists());
    }

    #[tokio::test]
    async fn test_empty_dump_fails() {
        let temp = TempDir::new().unwrap();
        let executor = DumpExecutor::new(Arc::new(Writes(b"")), temp.path());

        let err = executor.dump(&request(), "db.sql.gz").await.unwrap_err();
        assert!(matches!(
            err,
            kubackup_core::KubackupError::Dump(DumpError::EmptyOutput { .. })
        ));
        assert!(!temp.path().join("db.sql.gz.part").exists());
    }

    #[tokio::test]
    async fn test_creates_workdir() {
        let temp = TempDir::new().unwrap();
        let workdir = temp.path().join("nested").join("work");
        let executor = DumpExecutor::new(Arc::new(Writes(b"x")), &workdir)
            .with_compression(Compression::None);

        executor.dump(&request(), "x.tar").await.unwrap();
        assert!(workdir.join("x.tar").exists());
    }

    #[tokio::test]
    async fn test_failed_compression_leaves_no_output() {
        let temp = TempDir::new().unwrap();
        let executor = DumpExecutor::new(Arc::new(WritesDirectory), temp.path());

        let err = executor.dump(&request(), "db.sql.gz").await.unwrap_err();
        assert!(matches!(
            err,
            kubackup_core::KubackupError::Dump(DumpError::CompressionFailed(_))
        ));
        assert!(!temp.path().join("db.sql.gz").exists());
    }
}
