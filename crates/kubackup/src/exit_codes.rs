//! Exit codes for the CLI

#![allow(dead_code)]

use thiserror::Error;

use kubackup_core::{ClusterError, ConfigError, DumpError, KubackupError};
use kubackup_stores::StoreError;
use kubackup_tasks::{FailureKind, TaskError};

/// Success
pub const SUCCESS: i32 = 0;

/// General error
pub const ERROR: i32 = 1;

/// Configuration error
pub const CONFIG_ERROR: i32 = 2;

/// Cluster access error (kubectl, pod selection)
pub const CLUSTER_ERROR: i32 = 3;

/// Dump command error
pub const DUMP_ERROR: i32 = 4;

/// Object storage error
pub const STORAGE_ERROR: i32 = 5;

/// Validation error
pub const VALIDATION_ERROR: i32 = 6;

/// User cancelled
pub const CANCELLED: i32 = 130;

/// Errors raised by the CLI itself
#[derive(Debug, Error)]
pub enum CliError {
    /// `validate` found problems
    #[error("Validation failed with {0} error(s)")]
    Validation(usize),

    /// The user declined a prompt
    #[error("Cancelled")]
    Cancelled,

    /// A run finished with failed targets
    #[error("{message}")]
    RunFailed {
        message: String,
        failure: Option<FailureKind>,
    },
}

/// Exit code for a failure class
pub fn for_failure(kind: FailureKind) -> i32 {
    match kind {
        FailureKind::Config => CONFIG_ERROR,
        FailureKind::Cluster => CLUSTER_ERROR,
        FailureKind::Dump => DUMP_ERROR,
        FailureKind::Storage => STORAGE_ERROR,
        FailureKind::Hook | FailureKind::Notify | FailureKind::Other => ERROR,
    }
}

/// Exit code for an error, from the first cause that has one
pub fn for_error(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<CliError>() {
            return match e {
                CliError::Validation(_) => VALIDATION_ERROR,
                CliError::Cancelled => CANCELLED,
                CliError::RunFailed { failure, .. } => failure.map(for_failure).unwrap_or(ERROR),
            };
        }
        if let Some(e) = cause.downcast_ref::<TaskError>() {
            return for_failure(e.kind());
        }
        if let Some(e) = cause.downcast_ref::<KubackupError>() {
            match e {
                KubackupError::Config(_) => return CONFIG_ERROR,
                KubackupError::Cluster(_) => return CLUSTER_ERROR,
                KubackupError::Dump(_) => return DUMP_ERROR,
                _ => {}
            }
        }
        if cause.is::<ConfigError>() {
            return CONFIG_ERROR;
        }
        if cause.is::<ClusterError>() {
            return CLUSTER_ERROR;
        }
        if cause.is::<DumpError>() {
            return DUMP_ERROR;
        }
        if cause.is::<StoreError>() {
            return STORAGE_ERROR;
        }
        if let Some(e) = cause.downcast_ref::<std::io::Error>() {
            if e.kind() == std::io::ErrorKind::Interrupted {
                return CANCELLED;
            }
        }
    }
    ERROR
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_core_errors() {
        let err = anyhow::Error::from(KubackupError::from(ConfigError::UnknownTarget(
            "db".to_string(),
        )));
        assert_eq!(for_error(&err), CONFIG_ERROR);

        let err = anyhow::Error::from(ClusterError::KubectlNotFound("kubectl".to_string()));
        assert_eq!(for_error(&err), CLUSTER_ERROR);
    }

    #[test]
    fn test_context_is_looked_through() {
        let err: anyhow::Result<()> =
            Err(StoreError::UploadFailed("denied".to_string())).context("fetching snapshot");
        assert_eq!(for_error(&err.unwrap_err()), STORAGE_ERROR);
    }

    #[test]
    fn test_cli_errors() {
        assert_eq!(
            for_error(&CliError::Validation(2).into()),
            VALIDATION_ERROR
        );
        assert_eq!(for_error(&CliError::Cancelled.into()), CANCELLED);

        let failed = CliError::RunFailed {
            message: "1 of 2 failed".to_string(),
            failure: Some(FailureKind::Dump),
        };
        assert_eq!(for_error(&failed.into()), DUMP_ERROR);

        let hooks = CliError::RunFailed {
            message: "pre-run hook failed".to_string(),
            failure: None,
        };
        assert_eq!(for_error(&hooks.into()), ERROR);
    }

    #[test]
    fn test_task_errors() {
        let err = anyhow::Error::from(TaskError::UnknownStorage("cold".to_string()));
        assert_eq!(for_error(&err), CONFIG_ERROR);
        assert_eq!(for_error(&anyhow::anyhow!("boom")), ERROR);
    }
}
