//! Object storage backends for kubackup
//!
//! This crate wraps the command-line clients of the supported object stores
//! behind a single [`StorageBackend`] trait.
//!
//! ## Supported Backends
//!
//! - **S3**: AWS S3 and S3-compatible stores (MinIO, Ceph RGW) through the `aws` CLI
//! - **Swift**: OpenStack Swift through the `swift` CLI (python-swiftclient)
//!
//! Credentials are never handled here. The wrapped tools read them from their
//! usual environment variables (`AWS_ACCESS_KEY_ID`, `OS_AUTH_URL`, ...),
//! which are normally mounted from a cluster secret.
//!
//! ## Usage
//!
//! ```ignore
//! use kubackup_stores::{StorageRegistry, UploadOptions};
//!
//! let registry = StorageRegistry::from_configs(&config.storage)?;
//! let backend = registry.default_backend().unwrap();
//! backend.upload(&dump_path, "kubackup/default/postgres/20240101T000000Z.sql.gz", &UploadOptions::default()).await?;
//! ```

mod command;
pub mod error;
pub mod registry;
pub mod s3;
pub mod swift;
pub mod traits;
pub mod types;

pub use error::StoreError;
pub use registry::{build_backend, StorageRegistry};
pub use s3::S3Backend;
pub use swift::SwiftBackend;
pub use traits::StorageBackend;
pub use types::*;
