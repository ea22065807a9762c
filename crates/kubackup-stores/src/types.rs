//! Common types for storage backends

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Storage backend type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// AWS S3 or an S3-compatible store
    S3,
    /// OpenStack Swift
    Swift,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::S3 => write!(f, "S3"),
            BackendType::Swift => write!(f, "Swift"),
        }
    }
}

/// A named storage destination from configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Destination name, referenced by targets
    #[serde(default = "default_storage_name")]
    pub name: String,

    /// Backend-specific settings
    #[serde(flatten)]
    pub backend: BackendConfig,
}

fn default_storage_name() -> String {
    "default".to_string()
}

impl StorageConfig {
    /// Backend type of this destination
    pub fn backend_type(&self) -> BackendType {
        match self.backend {
            BackendConfig::S3(_) => BackendType::S3,
            BackendConfig::Swift(_) => BackendType::Swift,
        }
    }
}

/// Backend selection, tagged by the `backend` field
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum BackendConfig {
    /// S3 via the `aws` CLI
    S3(S3Config),
    /// Swift via the `swift` CLI
    Swift(SwiftConfig),
}

/// S3 destination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    /// Bucket name
    pub bucket: String,

    /// Custom endpoint (MinIO, Ceph RGW, ...)
    pub endpoint_url: Option<String>,

    /// Region override
    pub region: Option<String>,

    /// Named AWS profile
    pub profile: Option<String>,

    /// Storage class for uploaded objects (e.g. STANDARD_IA)
    pub storage_class: Option<String>,

    /// Path or name of the `aws` executable
    pub aws_cli: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            endpoint_url: None,
            region: None,
            profile: None,
            storage_class: None,
            aws_cli: "aws".to_string(),
        }
    }
}

/// Swift destination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwiftConfig {
    /// Container name
    pub container: String,

    /// Path or name of the `swift` executable
    pub swift_cli: String,

    /// Segment size in bytes for large object uploads
    pub segment_size: Option<u64>,
}

impl Default for SwiftConfig {
    fn default() -> Self {
        Self {
            container: String::new(),
            swift_cli: "swift".to_string(),
            segment_size: None,
        }
    }
}

/// Upload options for storage backends
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Dry run - report what would be uploaded without uploading
    pub dry_run: bool,

    /// Timeout in seconds
    pub timeout: Option<u64>,

    /// Object metadata attached to the upload
    pub metadata: BTreeMap<String, String>,
}

impl UploadOptions {
    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Result of an upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResult {
    /// Destination name
    pub destination: String,

    /// Object key
    pub key: String,

    /// Full location (e.g. `s3://bucket/key`)
    pub location: String,

    /// Uploaded size in bytes
    pub size_bytes: u64,

    /// Whether this was a dry run
    pub dry_run: bool,

    /// When the upload finished
    pub uploaded_at: DateTime<Utc>,
}

/// An object as reported by a backend listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    /// Object key
    pub key: String,

    /// Size in bytes, when the backend reports it
    pub size: Option<u64>,

    /// Last modification time, when the backend reports it
    pub last_modified: Option<DateTime<Utc>>,
}

impl StoredObject {
    /// Create an object entry with only a key
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size: None,
            last_modified: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_s3() {
        let json = r#"{"name": "primary", "backend": "s3", "bucket": "backups", "endpoint_url": "http://minio:9000"}"#;
        let config: StorageConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.name, "primary");
        assert_eq!(config.backend_type(), BackendType::S3);
        match config.backend {
            BackendConfig::S3(s3) => {
                assert_eq!(s3.bucket, "backups");
                assert_eq!(s3.endpoint_url.as_deref(), Some("http://minio:9000"));
                assert_eq!(s3.aws_cli, "aws");
            }
            BackendConfig::Swift(_) => panic!("expected s3"),
        }
    }

    #[test]
    fn test_storage_config_swift() {
        let json = r#"{"backend": "swift", "container": "dumps", "segment_size": 1073741824}"#;
        let config: StorageConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.name, "default");
        match config.backend {
            BackendConfig::Swift(swift) => {
                assert_eq!(swift.container, "dumps");
                assert_eq!(swift.swift_cli, "swift");
                assert_eq!(swift.segment_size, Some(1_073_741_824));
            }
            BackendConfig::S3(_) => panic!("expected swift"),
        }
    }

    #[test]
    fn test_backend_type_display() {
        assert_eq!(BackendType::S3.to_string(), "S3");
        assert_eq!(BackendType::Swift.to_string(), "Swift");
    }
}
