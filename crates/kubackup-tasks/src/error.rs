//! Task errors

use serde::Serialize;
use thiserror::Error;

use kubackup_core::KubackupError;
use kubackup_notify::NotifyError;
use kubackup_stores::StoreError;

/// Result type alias using TaskError
pub type Result<T> = std::result::Result<T, TaskError>;

/// Errors raised while running backup tasks
#[derive(Debug, Error)]
pub enum TaskError {
    /// Configuration, cluster, dump or hook failure
    #[error(transparent)]
    Core(#[from] KubackupError),

    /// Object storage failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Notification failure
    #[error(transparent)]
    Notify(#[from] NotifyError),

    /// A target names a destination that is not registered
    #[error("Unknown storage destination: {0}")]
    UnknownStorage(String),

    /// No storage destination is configured at all
    #[error("No storage destination configured")]
    NoStorage,
}

/// Broad class of a failure, used for exit codes and summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Config,
    Cluster,
    Dump,
    Storage,
    Hook,
    Notify,
    Other,
}

impl TaskError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Core(e) => match e {
                KubackupError::Config(_) => FailureKind::Config,
                KubackupError::Cluster(_) => FailureKind::Cluster,
                KubackupError::Dump(_) => FailureKind::Dump,
                KubackupError::Hook(_) => FailureKind::Hook,
                _ => FailureKind::Other,
            },
            Self::Store(_) => FailureKind::Storage,
            Self::Notify(_) => FailureKind::Notify,
            Self::UnknownStorage(_) | Self::NoStorage => FailureKind::Config,
        }
    }
}

impl From<kubackup_core::ConfigError> for TaskError {
    fn from(e: kubackup_core::ConfigError) -> Self {
        Self::Core(e.into())
    }
}

impl From<kubackup_core::ClusterError> for TaskError {
    fn from(e: kubackup_core::ClusterError) -> Self {
        Self::Core(e.into())
    }
}

impl From<kubackup_core::HookError> for TaskError {
    fn from(e: kubackup_core::HookError) -> Self {
        Self::Core(e.into())
    }
}

impl From<kubackup_core::DumpError> for TaskError {
    fn from(e: kubackup_core::DumpError) -> Self {
        Self::Core(e.into())
    }
}
