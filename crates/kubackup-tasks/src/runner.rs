//! Sequential backup runner

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use kubackup_cluster::{resolve_pod, ClusterClient, DumpExecutor, Pod};
use kubackup_core::config::{Config, NotifyOn};
use kubackup_core::hooks::build_hook_runner;
use kubackup_core::naming::PathContext;
use kubackup_core::retention::{plan, RetentionPlan};
use kubackup_core::{BackupPath, HookContext, HookRunner, HookStage, RetentionPolicy, SnapshotMatcher};
use kubackup_notify::Notifier;
use kubackup_stores::{StorageBackend, StorageRegistry, StoredObject, UploadOptions};

use crate::error::{Result, TaskError};
use crate::reporter::{BackupEvent, BackupReporter, TracingReporter};
use crate::summary::{RunSummary, TargetReport, TargetStatus};
use crate::task::BackupTask;

/// Options for a run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Resolve pods and keys only; nothing is executed, uploaded or deleted
    pub dry_run: bool,
    /// Apply retention after each upload
    pub prune: bool,
    /// Send the completion notification
    pub notify: bool,
    /// Keep going after a target failed
    pub continue_on_error: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            prune: true,
            notify: true,
            continue_on_error: false,
        }
    }
}

/// Where a target's snapshots live
#[derive(Debug, Clone, Serialize)]
pub struct LocatedTarget {
    pub pod: Pod,
    /// Key a snapshot taken now would get
    pub key: String,
    /// Listing prefix of the target's snapshots
    pub prefix: String,
    /// Accepts only keys this target produced
    #[serde(skip)]
    pub matcher: SnapshotMatcher,
    #[serde(skip)]
    pub context: PathContext,
}

/// Dry listing of a target
#[derive(Debug, Clone, Serialize)]
pub struct PlannedTarget {
    pub target: String,
    pub kind: String,
    pub namespace: String,
    pub enabled: bool,
    pub storage: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of applying retention to one prefix
#[derive(Debug, Clone, Serialize)]
pub struct PruneOutcome {
    pub target: String,
    pub storage: String,
    pub prefix: String,
    pub plan: RetentionPlan,
    /// Keys deleted, or that would be deleted in a dry run
    pub deleted: Vec<String>,
    pub dry_run: bool,
}

/// Runs backup tasks one after the other
pub struct BackupRunner {
    cluster: Arc<dyn ClusterClient>,
    stores: StorageRegistry,
    layout: BackupPath,
    workdir: PathBuf,
    hooks: HookRunner,
    notifier: Option<Arc<dyn Notifier>>,
    notify_on: NotifyOn,
    reporter: Arc<dyn BackupReporter>,
    options: RunOptions,
}

impl BackupRunner {
    pub fn new(
        cluster: Arc<dyn ClusterClient>,
        stores: StorageRegistry,
        layout: BackupPath,
        workdir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            cluster,
            stores,
            layout,
            workdir: workdir.into(),
            hooks: HookRunner::new(),
            notifier: None,
            notify_on: NotifyOn::default(),
            reporter: Arc::new(TracingReporter),
            options: RunOptions::default(),
        }
    }

    /// Runner wired from configuration (layout, workdir, hooks, notify policy)
    pub fn from_config(
        config: &Config,
        cluster: Arc<dyn ClusterClient>,
        stores: StorageRegistry,
    ) -> Self {
        Self::new(
            cluster,
            stores,
            BackupPath::from_layout(&config.layout),
            config.workdir(),
        )
        .with_hooks(build_hook_runner(&config.hooks, None))
        .with_notify_on(config.notifications.on)
    }

    pub fn with_hooks(mut self, hooks: HookRunner) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_notify_on(mut self, notify_on: NotifyOn) -> Self {
        self.notify_on = notify_on;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn BackupReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    fn storage(&self, task: &BackupTask) -> Result<Arc<dyn StorageBackend>> {
        self.stores
            .get(&task.storage)
            .ok_or_else(|| TaskError::UnknownStorage(task.storage.clone()))
    }

    /// Resolve the pod of a task and the keys derived from it
    pub async fn locate(&self, task: &BackupTask) -> Result<LocatedTarget> {
        let pod = resolve_pod(self.cluster.as_ref(), task.target()).await?;
        let context = task.path_context(&pod, Utc::now());
        Ok(LocatedTarget {
            key: self.layout.render(&context),
            prefix: self.layout.snapshot_prefix(&context),
            matcher: self.layout.snapshot_matcher(&context)?,
            pod,
            context,
        })
    }

    /// Run every task, then the post-run hooks and the notification.
    ///
    /// Target failures are recorded in the summary, not returned.
    pub async fn run(&self, tasks: &[BackupTask]) -> RunSummary {
        let started = Instant::now();
        let mut summary = RunSummary::new(self.options.dry_run);
        let base = HookContext::new()
            .with_run_id(summary.run_id.to_string())
            .with_dry_run(self.options.dry_run);

        info!(run_id = %summary.run_id, targets = tasks.len(), dry_run = self.options.dry_run, "starting run");

        if let Err(e) = self.hooks.run(HookStage::PreRun, &base).await {
            summary.run_error = Some(e.to_string());
            for task in tasks {
                self.skip(&mut summary, task, "pre-run hook failed");
            }
        } else {
            let mut stop = false;
            for task in tasks {
                if !task.enabled {
                    self.skip(&mut summary, task, "disabled");
                    continue;
                }
                if stop {
                    self.skip(&mut summary, task, "an earlier target failed");
                    continue;
                }

                let report = self.run_one(task, &base).await;
                if report.status == TargetStatus::Failed && !self.options.continue_on_error {
                    stop = true;
                }
                summary.reports.push(report);
            }

            let outcome = if summary.is_success() { "success" } else { "failure" };
            let post = base.clone().with_custom("status", outcome);
            if let Err(e) = self.hooks.run(HookStage::PostRun, &post).await {
                warn!(error = %e, "post-run hook failed");
                summary.run_error = Some(e.to_string());
            }
        }

        summary.finish();
        self.reporter.report(&BackupEvent::RunCompleted {
            total: summary.reports.len(),
            succeeded: summary.succeeded(),
            failed: summary.failed(),
            skipped: summary.skipped(),
            duration: started.elapsed(),
        });

        self.send_notification(&summary).await;
        summary
    }

    fn skip(&self, summary: &mut RunSummary, task: &BackupTask, reason: &str) {
        self.reporter.report(&BackupEvent::TargetSkipped {
            target: task.name.clone(),
            reason: reason.to_string(),
        });
        summary.reports.push(TargetReport::skipped(task, reason));
    }

    async fn run_one(&self, task: &BackupTask, base: &HookContext) -> TargetReport {
        let started = Instant::now();
        let mut report = TargetReport::new(task, TargetStatus::Succeeded);
        let mut ctx = base
            .clone()
            .with_target(&task.name)
            .with_namespace(&task.namespace)
            .with_kind(task.kind.as_str())
            .with_storage(&task.storage);

        if let Err(e) = self.backup(task, &mut ctx, &mut report).await {
            let error = e.to_string();
            self.reporter.report(&BackupEvent::TargetFailed {
                target: task.name.clone(),
                duration: started.elapsed(),
                error: error.clone(),
            });
            report.status = TargetStatus::Failed;
            report.error = Some(error.clone());
            report.failure = Some(e.kind());

            let failure = ctx.with_error(error);
            if let Err(hook_err) = self.hooks.run(HookStage::OnFailure, &failure).await {
                warn!(target_name = %task.name, error = %hook_err, "on-failure hook failed");
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        report
    }

    #[instrument(skip_all, fields(target_name = %task.name, namespace = %task.namespace))]
    async fn backup(
        &self,
        task: &BackupTask,
        ctx: &mut HookContext,
        report: &mut TargetReport,
    ) -> Result<()> {
        self.reporter.report(&BackupEvent::TargetStarted {
            target: task.name.clone(),
            namespace: task.namespace.clone(),
        });

        let storage = self.storage(task)?;
        self.hooks.run(HookStage::PreBackup, ctx).await?;

        let located = self.locate(task).await?;
        report.pod = Some(located.pod.name.clone());
        report.key = Some(located.key.clone());
        report.location = Some(storage.location(&located.key));
        ctx.set("pod", &located.pod.name);
        ctx.set("key", &located.key);
        self.reporter.report(&BackupEvent::PodSelected {
            target: task.name.clone(),
            pod: located.pod.name.clone(),
        });

        if self.options.dry_run {
            info!(pod = %located.pod.name, key = %located.key, "dry run, not dumping");
        } else {
            let executor = DumpExecutor::new(self.cluster.clone(), self.workdir.clone())
                .with_compression(task.compression);
            let artifact = executor
                .dump(&task.exec_request(&located.pod), BackupTask::file_name(&located.key))
                .await?;
            self.reporter.report(&BackupEvent::DumpCompleted {
                target: task.name.clone(),
                bytes: artifact.raw_bytes,
                duration: std::time::Duration::from_millis(artifact.duration_ms),
            });

            let options = UploadOptions {
                timeout: Some(task.timeout_secs),
                ..Default::default()
            }
            .with_metadata("kubackup-target", &task.name)
            .with_metadata("kubackup-kind", task.kind.as_str())
            .with_metadata("kubackup-pod", &located.pod.name)
            .with_metadata("kubackup-sha256", &artifact.sha256);

            let uploaded = storage.upload(&artifact.path, &located.key, &options).await;
            artifact.remove().await;
            let uploaded = uploaded?;

            report.location = Some(uploaded.location.clone());
            report.size_bytes = Some(uploaded.size_bytes);
            report.sha256 = Some(artifact.sha256.clone());
            self.reporter.report(&BackupEvent::Uploaded {
                target: task.name.clone(),
                key: uploaded.key,
                location: uploaded.location,
                size_bytes: uploaded.size_bytes,
            });
        }

        self.hooks.run(HookStage::PostBackup, ctx).await?;

        if self.options.prune {
            match self
                .prune_located(task, storage.as_ref(), &located, &task.retention)
                .await
            {
                Ok(outcome) => {
                    self.reporter.report(&BackupEvent::Pruned {
                        target: task.name.clone(),
                        deleted: outcome.deleted.len(),
                        kept: outcome.plan.keep.len(),
                    });
                    report.pruned = outcome.deleted;
                }
                Err(e) => {
                    warn!(prefix = %located.prefix, error = %e, "retention failed, snapshots left in place");
                }
            }
        }

        Ok(())
    }

    async fn prune_located(
        &self,
        task: &BackupTask,
        storage: &dyn StorageBackend,
        located: &LocatedTarget,
        policy: &RetentionPolicy,
    ) -> Result<PruneOutcome> {
        let prefix = located.prefix.as_str();
        let objects = storage.list(prefix).await?;
        let plan = plan(objects, &located.matcher, policy, Utc::now());

        for object in &plan.ignored {
            debug!(key = %object.key, "not a snapshot of this target, left alone");
        }

        let mut deleted = Vec::with_capacity(plan.prune.len());
        for snapshot in &plan.prune {
            if self.options.dry_run {
                info!(key = %snapshot.key, "would delete");
            } else {
                storage.delete(&snapshot.key).await?;
                info!(key = %snapshot.key, "deleted");
            }
            deleted.push(snapshot.key.clone());
        }

        Ok(PruneOutcome {
            target: task.name.clone(),
            storage: storage.name().to_string(),
            prefix: prefix.to_string(),
            plan,
            deleted,
            dry_run: self.options.dry_run,
        })
    }

    /// Apply retention to one target on demand
    pub async fn prune_target(
        &self,
        task: &BackupTask,
        keep_last: Option<usize>,
    ) -> Result<PruneOutcome> {
        let storage = self.storage(task)?;
        let located = self.locate(task).await?;
        let mut policy = task.retention;
        if let Some(keep_last) = keep_last {
            policy.keep_last = keep_last.max(1);
        }
        self.prune_located(task, storage.as_ref(), &located, &policy)
            .await
    }

    /// Stored snapshots of a target, newest first; other targets' keys
    /// under the same prefix are left out
    pub async fn list_snapshots(
        &self,
        task: &BackupTask,
    ) -> Result<(LocatedTarget, Vec<StoredObject>)> {
        let storage = self.storage(task)?;
        let located = self.locate(task).await?;
        let mut objects = storage.list(&located.prefix).await?;
        objects.retain(|o| located.matcher.matches(&o.key));
        objects.sort_by(|a, b| b.key.cmp(&a.key));
        Ok((located, objects))
    }

    /// Resolve pods and keys without running anything
    pub async fn plan_targets(&self, tasks: &[BackupTask]) -> Vec<PlannedTarget> {
        let mut planned = Vec::with_capacity(tasks.len());
        for task in tasks {
            let mut entry = PlannedTarget {
                target: task.name.clone(),
                kind: task.kind.to_string(),
                namespace: task.namespace.clone(),
                enabled: task.enabled,
                storage: task.storage.clone(),
                source: task.target().pod_source(),
                pod: None,
                key: None,
                error: None,
            };
            match self.locate(task).await {
                Ok(located) => {
                    entry.pod = Some(located.pod.name);
                    entry.key = Some(located.key);
                }
                Err(e) => entry.error = Some(e.to_string()),
            }
            planned.push(entry);
        }
        planned
    }

    async fn send_notification(&self, summary: &RunSummary) {
        if !self.options.notify || self.options.dry_run {
            return;
        }
        let Some(notifier) = &self.notifier else {
            return;
        };
        if !self.notify_on.should_notify(summary.is_success()) {
            debug!(notify_on = ?self.notify_on, "notification not required");
            return;
        }

        if let Err(e) = notifier.notify(&summary.to_notification()).await {
            warn!(notifier = notifier.name(), error = %e, "failed to send notification");
        }
    }
}
