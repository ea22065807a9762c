//! Backup tasks resolved from configuration

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use kubackup_cluster::{ExecRequest, Pod};
use kubackup_core::config::{Config, TargetConfig};
use kubackup_core::naming::{clean_name, PathContext};
use kubackup_core::{BackupKind, Compression, RetentionPolicy};

use crate::error::{Result, TaskError};

/// A target with every default filled in
#[derive(Debug, Clone, Serialize)]
pub struct BackupTask {
    pub name: String,
    pub kind: BackupKind,
    pub namespace: String,
    pub selector: Option<String>,
    pub pod: Option<String>,
    pub container: Option<String>,
    /// Command run in the container
    pub command: String,
    /// File extension including the compression suffix
    pub extension: String,
    /// Storage destination name
    pub storage: String,
    pub retention: RetentionPolicy,
    pub compression: Compression,
    pub timeout_secs: u64,
    pub enabled: bool,
    #[serde(skip)]
    target: TargetConfig,
}

impl BackupTask {
    /// Resolve one target against the configuration defaults
    pub fn resolve(config: &Config, target: &TargetConfig) -> Result<Self> {
        let storage = match &target.storage {
            Some(name) => name.clone(),
            None => config
                .storage
                .first()
                .map(|s| s.name.clone())
                .ok_or(TaskError::NoStorage)?,
        };

        Ok(Self {
            name: target.name.clone(),
            kind: target.kind,
            namespace: target.namespace.clone(),
            selector: target.selector.clone(),
            pod: target.pod.clone(),
            container: target.container.clone(),
            command: target.dump_command()?,
            extension: target.extension(config.compression),
            storage,
            retention: RetentionPolicy::from_config(&config.retention, target.keep_last),
            compression: config.compression,
            timeout_secs: target.timeout_secs,
            enabled: target.enabled,
            target: target.clone(),
        })
    }

    /// Resolve the named targets, or all of them when `names` is empty
    pub fn resolve_all(config: &Config, names: &[String]) -> Result<Vec<Self>> {
        config
            .select_targets(names)?
            .into_iter()
            .map(|t| Self::resolve(config, t))
            .collect()
    }

    /// The configured target this task came from
    pub fn target(&self) -> &TargetConfig {
        &self.target
    }

    /// Key template values for a snapshot taken from `pod` at `at`
    pub fn path_context(&self, pod: &Pod, at: DateTime<Utc>) -> PathContext {
        let name = clean_name(&self.namespace, &pod.workload_name());
        PathContext::new(
            &self.name,
            self.kind.as_str(),
            &self.namespace,
            name,
            &self.extension,
        )
        .with_timestamp(at)
    }

    /// The exec that produces the dump
    pub fn exec_request(&self, pod: &Pod) -> ExecRequest {
        ExecRequest {
            namespace: self.namespace.clone(),
            pod: pod.name.clone(),
            container: self.container.clone(),
            command: self.command.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    /// Local file name for a key: its last path segment
    pub fn file_name(key: &str) -> &str {
        key.rsplit('/').next().unwrap_or(key)
    }
}
