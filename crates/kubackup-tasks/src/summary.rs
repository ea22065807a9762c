//! Run summary

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use kubackup_core::BackupKind;
use kubackup_notify::Notification;

use crate::error::{FailureKind, TaskError};
use crate::task::BackupTask;

/// Outcome of one target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// What happened to one target
#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    pub target: String,
    pub namespace: String,
    pub kind: BackupKind,
    pub status: TargetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// Keys removed by retention
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pruned: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    pub duration_ms: u64,
}

impl TargetReport {
    pub fn new(task: &BackupTask, status: TargetStatus) -> Self {
        Self {
            target: task.name.clone(),
            namespace: task.namespace.clone(),
            kind: task.kind,
            status,
            pod: None,
            key: None,
            location: None,
            storage: Some(task.storage.clone()),
            size_bytes: None,
            sha256: None,
            pruned: Vec::new(),
            error: None,
            failure: None,
            skip_reason: None,
            duration_ms: 0,
        }
    }

    pub fn skipped(task: &BackupTask, reason: impl Into<String>) -> Self {
        let mut report = Self::new(task, TargetStatus::Skipped);
        report.skip_reason = Some(reason.into());
        report
    }

    pub fn failed(task: &BackupTask, error: &TaskError, duration_ms: u64) -> Self {
        let mut report = Self::new(task, TargetStatus::Failed);
        report.error = Some(error.to_string());
        report.failure = Some(error.kind());
        report.duration_ms = duration_ms;
        report
    }

    fn line(&self) -> String {
        match self.status {
            TargetStatus::Succeeded => format!(
                "ok   {} -> {}",
                self.target,
                self.location
                    .as_deref()
                    .or(self.key.as_deref())
                    .unwrap_or("-")
            ),
            TargetStatus::Failed => format!(
                "FAIL {}: {}",
                self.target,
                self.error.as_deref().unwrap_or("unknown error")
            ),
            TargetStatus::Skipped => format!(
                "skip {}: {}",
                self.target,
                self.skip_reason.as_deref().unwrap_or("skipped")
            ),
        }
    }
}

/// Everything a run did
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub reports: Vec<TargetReport>,
    /// Failure outside any target (pre-run or post-run hooks)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_error: Option<String>,
}

impl RunSummary {
    pub fn new(dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            reports: Vec::new(),
            run_error: None,
        }
    }

    fn count(&self, status: TargetStatus) -> usize {
        self.reports.iter().filter(|r| r.status == status).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(TargetStatus::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(TargetStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(TargetStatus::Skipped)
    }

    /// Failure kind of the first failed target
    pub fn first_failure(&self) -> Option<FailureKind> {
        self.reports
            .iter()
            .filter(|r| r.status == TargetStatus::Failed)
            .find_map(|r| r.failure)
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.run_error.is_none()
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Wall time of the run; zero until finished
    pub fn duration(&self) -> std::time::Duration {
        self.finished_at
            .and_then(|end| (end - self.started_at).to_std().ok())
            .unwrap_or_default()
    }

    /// Headline used in notifications and the CLI
    pub fn headline(&self) -> String {
        let total = self.reports.len();
        let mode = if self.dry_run { " (dry run)" } else { "" };

        if let Some(error) = &self.run_error {
            return format!("kubackup run failed{}: {}", mode, error);
        }
        match self.failed() {
            0 => format!(
                "kubackup: {} of {} target(s) backed up{}",
                self.succeeded(),
                total,
                mode
            ),
            failed => format!("kubackup: {} of {} target(s) failed{}", failed, total, mode),
        }
    }

    pub fn to_notification(&self) -> Notification {
        let summary = serde_json::to_value(self).unwrap_or_default();
        self.reports.iter().fold(
            Notification::new(self.headline(), self.is_success()).with_summary(summary),
            |n, report| n.with_line(report.line()),
        )
    }
}
