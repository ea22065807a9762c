//! kubackup Tasks - Backup execution
//!
//! Turns configured targets into [`BackupTask`]s and runs them one after the
//! other: hooks, pod selection, dump, upload, retention and the final
//! notification.

pub mod error;
pub mod reporter;
pub mod runner;
pub mod summary;
pub mod task;

pub use error::{FailureKind, Result, TaskError};
pub use reporter::{
    BackupEvent, BackupReporter, BackupReporterRegistry, CollectingReporter, TracingReporter,
};
pub use runner::{BackupRunner, LocatedTarget, PlannedTarget, PruneOutcome, RunOptions};
pub use summary::{RunSummary, TargetReport, TargetStatus};
pub use task::BackupTask;
