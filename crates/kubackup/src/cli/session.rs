//! Configuration and clients shared by the commands

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use kubackup_cluster::Kubectl;
use kubackup_core::config::{resolve_config, validate_config, Config};
use kubackup_notify::WebhookNotifier;
use kubackup_stores::StorageRegistry;
use kubackup_tasks::{BackupReporter, BackupRunner, BackupTask, RunOptions};

use super::Cli;

/// Loaded configuration with command-line overrides applied
pub struct Session {
    pub config: Config,
    pub config_path: PathBuf,
    pub kubectl: Arc<Kubectl>,
}

impl Session {
    /// Load and validate the configuration for `cli`
    pub fn open(cli: &Cli) -> anyhow::Result<Self> {
        let cwd = std::env::current_dir()?;
        let (mut config, config_path) = resolve_config(cli.config.as_deref(), &cwd)?;
        apply_overrides(cli, &mut config);
        validate_config(&config)?;
        info!(path = %config_path.display(), targets = config.targets.len(), "configuration ready");

        let kubectl = Arc::new(Kubectl::from_config(&config.cluster));
        Ok(Self {
            config,
            config_path,
            kubectl,
        })
    }

    /// Resolve the named targets, or all of them
    pub fn tasks(&self, names: &[String]) -> anyhow::Result<Vec<BackupTask>> {
        Ok(BackupTask::resolve_all(&self.config, names)?)
    }

    /// A runner wired to kubectl, the configured storage and notifications
    pub fn runner(
        &self,
        options: RunOptions,
        reporter: Arc<dyn BackupReporter>,
    ) -> anyhow::Result<BackupRunner> {
        let stores = StorageRegistry::from_configs(&self.config.storage)?;
        let mut runner = BackupRunner::from_config(&self.config, self.kubectl.clone(), stores)
            .with_options(options)
            .with_reporter(reporter);

        if let Some(notifier) = WebhookNotifier::from_config(&self.config.notifications)? {
            debug!(host = notifier.host(), "notifications enabled");
            runner = runner.with_notifier(Arc::new(notifier));
        }
        Ok(runner)
    }
}

pub(crate) fn apply_overrides(cli: &Cli, config: &mut Config) {
    if let Some(context) = &cli.context {
        config.cluster.context = Some(context.clone());
    }
    if let Some(kubeconfig) = &cli.kubeconfig {
        config.cluster.kubeconfig = Some(kubeconfig.clone());
    }
    if let Some(url) = &cli.webhook_url {
        config.notifications.webhook_url = Some(url.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "kubackup",
            "--context",
            "staging",
            "--kubeconfig",
            "/tmp/kubeconfig",
            "--webhook-url",
            "https://hooks.example.com/abc",
            "targets",
        ])
        .unwrap();

        let mut config = Config::default();
        apply_overrides(&cli, &mut config);
        assert_eq!(config.cluster.context.as_deref(), Some("staging"));
        assert_eq!(
            config.cluster.kubeconfig,
            Some(PathBuf::from("/tmp/kubeconfig"))
        );
        assert_eq!(
            config.notifications.webhook_url.as_deref(),
            Some("https://hooks.example.com/abc")
        );
    }

    #[test]
    fn test_open_explicit_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("backup.yaml");
        std::fs::write(
            &path,
            "storage:\n  - name: primary\n    backend: s3\n    bucket: backups\ntargets:\n  - name: db\n    kind: postgres\n    namespace: prod\n    selector: app=postgres\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "kubackup",
            "--config",
            path.to_str().unwrap(),
            "--context",
            "prod-eu",
            "targets",
        ])
        .unwrap();

        let session = Session::open(&cli).unwrap();
        assert_eq!(session.config_path, path);
        assert_eq!(session.config.cluster.context.as_deref(), Some("prod-eu"));

        let tasks = session.tasks(&[]).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].storage, "primary");
        assert!(session.tasks(&["nope".to_string()]).is_err());
    }
}
