//! Storage backend traits

use crate::error::Result;
use crate::types::*;
use std::path::Path;

/// Trait for object storage backends
///
/// Keys are always `/`-separated object names relative to the bucket or
/// container the backend was configured with.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Get the destination name from configuration
    fn name(&self) -> &str;

    /// Get the backend type
    fn backend_type(&self) -> BackendType;

    /// Check if the wrapped client tool is installed
    fn is_available(&self) -> bool;

    /// Human-readable location of a key (e.g. `s3://bucket/key`)
    fn location(&self, key: &str) -> String;

    /// Upload a local file under the given key
    async fn upload(&self, path: &Path, key: &str, options: &UploadOptions) -> Result<UploadResult>;

    /// List objects whose key starts with `prefix`
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>>;

    /// Delete a single object
    async fn delete(&self, key: &str) -> Result<()>;

    /// Download a single object to a local path
    async fn download(&self, key: &str, dest: &Path) -> Result<()>;
}
