//! Configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use kubackup_stores::StorageConfig;

use crate::error::{ConfigError, DumpError};
use crate::hooks::HooksConfig;
use crate::types::{BackupKind, Compression};

/// Main configuration for kubackup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Version of the config schema
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Cluster access
    pub cluster: ClusterConfig,

    /// Storage destinations; the first one is the default
    pub storage: Vec<StorageConfig>,

    /// Object key layout
    pub layout: LayoutConfig,

    /// Retention of old snapshots
    pub retention: RetentionConfig,

    /// Local compression of dumps
    pub compression: Compression,

    /// Directory for temporary dump files (defaults to the system temp dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workdir: Option<PathBuf>,

    /// Completion notifications
    pub notifications: NotificationConfig,

    /// Hooks configuration
    pub hooks: HooksConfig,

    /// Backup targets
    pub targets: Vec<TargetConfig>,
}

impl Config {
    /// Look up a target by name
    pub fn target(&self, name: &str) -> std::result::Result<&TargetConfig, ConfigError> {
        self.targets
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| ConfigError::UnknownTarget(name.to_string()))
    }

    /// Select targets by name, or all targets when `names` is empty
    pub fn select_targets(
        &self,
        names: &[String],
    ) -> std::result::Result<Vec<&TargetConfig>, ConfigError> {
        if names.is_empty() {
            return Ok(self.targets.iter().collect());
        }
        names.iter().map(|n| self.target(n)).collect()
    }

    /// Directory where dumps are staged before upload
    pub fn workdir(&self) -> PathBuf {
        self.workdir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("kubackup"))
    }
}

/// Cluster access configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Path or name of the `kubectl` executable
    pub kubectl: String,

    /// kubeconfig context to use
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// kubeconfig file to use
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<PathBuf>,

    /// Timeout for API requests (not for exec streams)
    pub request_timeout_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            kubectl: "kubectl".to_string(),
            context: None,
            kubeconfig: None,
            request_timeout_secs: 30,
        }
    }
}

/// Object key layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Prefix prepended to every key
    pub prefix: String,

    /// Key template; placeholders: {namespace} {name} {target} {kind} {timestamp} {ext}
    pub template: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            prefix: "kubackup".to_string(),
            template: "{namespace}/{name}/{target}/{timestamp}.{ext}".to_string(),
        }
    }
}

/// Retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Number of newest snapshots always kept
    pub keep_last: usize,

    /// Snapshots younger than this many days are kept as well
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_days: Option<u32>,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            keep_last: 7,
            keep_days: None,
        }
    }
}

/// Notification payload format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyFormat {
    /// `{"text": ...}`, understood by Slack, Mattermost and Rocket.Chat
    #[default]
    Slack,
    /// The full run summary as JSON
    Json,
}

/// When to send a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyOn {
    /// After every run
    #[default]
    Always,
    /// Only when at least one target failed
    Failure,
    /// Never
    Never,
}

impl NotifyOn {
    /// Whether a run with the given outcome should be notified
    pub fn should_notify(&self, success: bool) -> bool {
        match self {
            Self::Always => true,
            Self::Failure => !success,
            Self::Never => false,
        }
    }
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Webhook URL; notifications are disabled when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    /// Payload format
    pub format: NotifyFormat,

    /// When to notify
    pub on: NotifyOn,

    /// Display name override (chat formats)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Channel override (chat formats)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// HTTP timeout
    pub timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            format: NotifyFormat::default(),
            on: NotifyOn::default(),
            username: None,
            channel: None,
            timeout_secs: 10,
        }
    }
}

/// A single backup target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Unique target name
    pub name: String,

    /// What is being backed up
    pub kind: BackupKind,

    /// Namespace of the pod
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Label selector used to find the pod
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    /// Explicit pod name (wins over `selector`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod: Option<String>,

    /// Container to exec into (defaults to the pod's first container)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,

    /// Single database to dump (postgres, mysql, mongodb)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Paths to archive (files)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,

    /// Data directory (zookeeper)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    /// Custom dump command, replaces the kind's default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Custom extension, replaces the kind's default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,

    /// Storage destination name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,

    /// Retention override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_last: Option<usize>,

    /// Dump time limit
    #[serde(default = "default_target_timeout")]
    pub timeout_secs: u64,

    /// Disabled targets are skipped
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_target_timeout() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

impl TargetConfig {
    /// Create a target with defaults for everything but name and kind
    pub fn new(name: impl Into<String>, kind: BackupKind) -> Self {
        Self {
            name: name.into(),
            kind,
            namespace: default_namespace(),
            selector: None,
            pod: None,
            container: None,
            database: None,
            paths: Vec::new(),
            data_dir: None,
            command: None,
            extension: None,
            storage: None,
            keep_last: None,
            timeout_secs: default_target_timeout(),
            enabled: true,
        }
    }

    /// Command run in the container
    pub fn dump_command(&self) -> std::result::Result<String, DumpError> {
        if let Some(command) = &self.command {
            return Ok(command.clone());
        }
        self.kind
            .default_command(self)
            .map_err(|reason| DumpError::InvalidCommand {
                target: self.name.clone(),
                reason,
            })
    }

    /// Final file extension, including the compression suffix
    pub fn extension(&self, compression: Compression) -> String {
        let base = self
            .extension
            .as_deref()
            .map(|e| e.trim_start_matches('.'))
            .unwrap_or_else(|| self.kind.default_extension());
        format!("{}{}", base, compression.suffix())
    }

    /// How the pod is located, for display
    pub fn pod_source(&self) -> String {
        match (&self.pod, &self.selector) {
            (Some(pod), _) => format!("pod/{}", pod),
            (None, Some(selector)) => format!("-l {}", selector),
            (None, None) => "(unset)".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_defaults_from_yaml() {
        let yaml = "name: db\nkind: postgres\nselector: app=postgres\n";
        let target: TargetConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(target.namespace, "default");
        assert_eq!(target.timeout_secs, 3600);
        assert!(target.enabled);
        assert_eq!(target.pod_source(), "-l app=postgres");
    }

    #[test]
    fn test_target_requires_kind() {
        let yaml = "name: db\n";
        assert!(serde_yaml::from_str::<TargetConfig>(yaml).is_err());
    }

    #[test]
    fn test_dump_command_override() {
        let mut target = TargetConfig::new("redis", BackupKind::Files);
        assert!(target.dump_command().is_err());
        target.command = Some("redis-cli --rdb - ".to_string());
        assert_eq!(target.dump_command().unwrap(), "redis-cli --rdb - ");
    }

    #[test]
    fn test_extension() {
        let mut target = TargetConfig::new("db", BackupKind::Postgres);
        assert_eq!(target.extension(Compression::Gzip), "sql.gz");
        assert_eq!(target.extension(Compression::None), "sql");
        target.extension = Some(".rdb".to_string());
        assert_eq!(target.extension(Compression::Gzip), "rdb.gz");
    }

    #[test]
    fn test_select_targets() {
        let config = Config {
            targets: vec![
                TargetConfig::new("a", BackupKind::Postgres),
                TargetConfig::new("b", BackupKind::Mysql),
            ],
            ..Default::default()
        };

        assert_eq!(config.select_targets(&[]).unwrap().len(), 2);
        let selected = config.select_targets(&["b".to_string()]).unwrap();
        assert_eq!(selected[0].name, "b");
        assert!(matches!(
            config.select_targets(&["c".to_string()]),
            Err(ConfigError::UnknownTarget(_))
        ));
    }

    #[test]
    fn test_notify_on() {
        assert!(NotifyOn::Always.should_notify(true));
        assert!(!NotifyOn::Failure.should_notify(true));
        assert!(NotifyOn::Failure.should_notify(false));
        assert!(!NotifyOn::Never.should_notify(false));
    }

    #[test]
    fn test_workdir_default() {
        let config = Config::default();
        assert!(config.workdir().ends_with("kubackup"));
    }
}
