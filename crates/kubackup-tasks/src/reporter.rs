//! Backup run reporting

use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Events emitted while a run progresses
#[derive(Debug, Clone)]
pub enum BackupEvent {
    /// A target is starting
    TargetStarted { target: String, namespace: String },
    /// The pod to dump from was chosen
    PodSelected { target: String, pod: String },
    /// The dump is staged locally
    DumpCompleted {
        target: String,
        bytes: u64,
        duration: Duration,
    },
    /// The dump was stored
    Uploaded {
        target: String,
        key: String,
        location: String,
        size_bytes: u64,
    },
    /// Old snapshots were removed (or would be, in a dry run)
    Pruned {
        target: String,
        deleted: usize,
        kept: usize,
    },
    /// A target failed
    TargetFailed {
        target: String,
        duration: Duration,
        error: String,
    },
    /// A target was not run
    TargetSkipped { target: String, reason: String },
    /// The run is over
    RunCompleted {
        total: usize,
        succeeded: usize,
        failed: usize,
        skipped: usize,
        duration: Duration,
    },
}

/// Trait for reporting run progress
pub trait BackupReporter: Send + Sync {
    /// Handle a run event
    fn report(&self, event: &BackupEvent);
}

/// Reporter that logs to tracing
#[derive(Debug, Default)]
pub struct TracingReporter;

impl BackupReporter for TracingReporter {
    fn report(&self, event: &BackupEvent) {
        match event {
            BackupEvent::TargetStarted { target, namespace } => {
                tracing::info!(target_name = %target, namespace = %namespace, "starting backup");
            }
            BackupEvent::PodSelected { target, pod } => {
                tracing::info!(target_name = %target, pod = %pod, "pod selected");
            }
            BackupEvent::DumpCompleted {
                target,
                bytes,
                duration,
            } => {
                tracing::info!(
                    target_name = %target,
                    bytes,
                    "dump completed in {:.1}s",
                    duration.as_secs_f64()
                );
            }
            BackupEvent::Uploaded {
                target,
                key,
                location,
                size_bytes,
            } => {
                tracing::info!(target_name = %target, key = %key, size_bytes, "uploaded to {}", location);
            }
            BackupEvent::Pruned {
                target,
                deleted,
                kept,
            } => {
                tracing::info!(target_name = %target, deleted, kept, "retention applied");
            }
            BackupEvent::TargetFailed {
                target,
                duration,
                error,
            } => {
                tracing::error!(
                    target_name = %target,
                    "failed after {:.1}s: {}",
                    duration.as_secs_f64(),
                    error
                );
            }
            BackupEvent::TargetSkipped { target, reason } => {
                tracing::info!(target_name = %target, "skipped: {}", reason);
            }
            BackupEvent::RunCompleted {
                total,
                succeeded,
                failed,
                skipped,
                duration,
            } => {
                tracing::info!(
                    "Run complete: {}/{} succeeded, {} failed, {} skipped ({:.1}s)",
                    succeeded,
                    total,
                    failed,
                    skipped,
                    duration.as_secs_f64()
                );
            }
        }
    }
}

/// Reporter that collects events for later inspection
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: Mutex<Vec<BackupEvent>>,
}

impl CollectingReporter {
    /// Get all collected events
    pub fn events(&self) -> Vec<BackupEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl BackupReporter for CollectingReporter {
    fn report(&self, event: &BackupEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Fan-out to several reporters
pub struct BackupReporterRegistry {
    reporters: Vec<Arc<dyn BackupReporter>>,
}

impl BackupReporterRegistry {
    /// Registry with a [`TracingReporter`]
    pub fn new() -> Self {
        Self {
            reporters: vec![Arc::new(TracingReporter)],
        }
    }

    pub fn empty() -> Self {
        Self {
            reporters: Vec::new(),
        }
    }

    pub fn register<R: BackupReporter + 'static>(&mut self, reporter: R) {
        self.reporters.push(Arc::new(reporter));
    }

    pub fn register_arc(&mut self, reporter: Arc<dyn BackupReporter>) {
        self.reporters.push(reporter);
    }

    pub fn all(&self) -> &[Arc<dyn BackupReporter>] {
        &self.reporters
    }
}

impl Default for BackupReporterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BackupReporter for BackupReporterRegistry {
    fn report(&self, event: &BackupEvent) {
        for reporter in &self.reporters {
            reporter.report(event);
        }
    }
}
