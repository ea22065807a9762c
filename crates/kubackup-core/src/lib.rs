//! kubackup Core - Core library for Kubernetes container backups
//!
//! This crate provides the foundational types, error handling, configuration,
//! backup-path naming and retention planning for the kubackup tool.

pub mod config;
pub mod error;
pub mod hooks;
pub mod naming;
pub mod retention;
pub mod types;

pub use error::{ClusterError, ConfigError, DumpError, HookError, KubackupError, Result};
pub use hooks::{Hook, HookContext, HookRunner, HookStage};
pub use naming::{BackupPath, OwnerReference, PathContext, SnapshotMatcher};
pub use retention::{RetentionPlan, RetentionPolicy, Snapshot};
pub use types::{BackupKind, Compression};
