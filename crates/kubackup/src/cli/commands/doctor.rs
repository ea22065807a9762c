//! Doctor command - check the environment for the tools kubackup drives

use std::path::Path;

use clap::Args;
use console::style;
use serde::Serialize;
use tracing::info;

use kubackup_cluster::{ClusterClient, Kubectl};
use kubackup_core::config::{resolve_config, Config};
use kubackup_notify::WebhookNotifier;
use kubackup_stores::build_backend;

use crate::cli::session::apply_overrides;
use crate::cli::{Cli, OutputFormat};

/// Check the environment for required tools
#[derive(Debug, Args)]
pub struct DoctorCommand {
    /// Do not contact the cluster
    #[arg(long)]
    pub offline: bool,
}

/// Result of a single check
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: Option<String>,
    pub fix_suggestion: Option<String>,
}

impl CheckResult {
    fn new(name: impl Into<String>, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            message: Some(message.into()),
            fix_suggestion: None,
        }
    }

    fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.fix_suggestion = Some(fix.into());
        self
    }
}

/// Status of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Warn,
    Fail,
    Skip,
}

/// Summary of all checks
#[derive(Debug, Serialize)]
pub struct DoctorSummary {
    pub checks: Vec<CheckResult>,
    pub ok_count: usize,
    pub warn_count: usize,
    pub fail_count: usize,
    pub skip_count: usize,
}

impl DoctorSummary {
    fn new(checks: Vec<CheckResult>) -> Self {
        let count = |status| checks.iter().filter(|c| c.status == status).count();
        Self {
            ok_count: count(CheckStatus::Ok),
            warn_count: count(CheckStatus::Warn),
            fail_count: count(CheckStatus::Fail),
            skip_count: count(CheckStatus::Skip),
            checks,
        }
    }
}

impl DoctorCommand {
    /// Execute the doctor command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(offline = self.offline, "executing doctor command");

        if cli.show_text() {
            println!("{}", style("Checking environment...").bold());
            println!();
        }

        let mut checks = Vec::new();
        let cwd = std::env::current_dir()?;
        let config = match resolve_config(cli.config.as_deref(), &cwd) {
            Ok((mut config, path)) => {
                apply_overrides(cli, &mut config);
                checks.push(CheckResult::new(
                    "Configuration",
                    CheckStatus::Ok,
                    path.display().to_string(),
                ));
                config
            }
            Err(e) => {
                checks.push(
                    CheckResult::new("Configuration", CheckStatus::Fail, e.to_string())
                        .with_fix("Run 'kubackup init' or pass --config"),
                );
                let mut config = Config::default();
                apply_overrides(cli, &mut config);
                config
            }
        };

        checks.extend(self.check_cluster(&config).await);
        checks.extend(check_storage(&config));
        checks.push(check_notifications(&config));
        checks.push(check_workdir(&config.workdir()));

        let summary = DoctorSummary::new(checks);

        match cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            OutputFormat::Text => {
                if !cli.quiet {
                    print_results(&summary);
                }
            }
        }

        if summary.fail_count > 0 {
            anyhow::bail!("{} check(s) failed", summary.fail_count);
        }

        Ok(())
    }

    async fn check_cluster(&self, config: &Config) -> Vec<CheckResult> {
        let kubectl = Kubectl::from_config(&config.cluster);
        if !kubectl.is_available() {
            return vec![CheckResult::new(
                "kubectl",
                CheckStatus::Fail,
                format!("'{}' not found on PATH", kubectl.program()),
            )
            .with_fix("Install kubectl or set cluster.kubectl")];
        }

        if self.offline {
            return vec![
                CheckResult::new("kubectl", CheckStatus::Ok, kubectl.program()),
                CheckResult::new("Cluster", CheckStatus::Skip, "offline"),
            ];
        }

        match kubectl.version().await {
            Ok(version) => {
                let client = CheckResult::new("kubectl", CheckStatus::Ok, version.client.clone());
                let server = match version.server {
                    Some(server) => CheckResult::new(
                        "Cluster",
                        CheckStatus::Ok,
                        format!(
                            "server {}{}",
                            server,
                            config
                                .cluster
                                .context
                                .as_deref()
                                .map(|c| format!(" (context {})", c))
                                .unwrap_or_default()
                        ),
                    ),
                    None => CheckResult::new("Cluster", CheckStatus::Fail, "unreachable")
                        .with_fix("Check the kubeconfig context and cluster credentials"),
                };
                vec![client, server]
            }
            Err(e) => vec![CheckResult::new("kubectl", CheckStatus::Fail, e.to_string())],
        }
    }
}

fn check_storage(config: &Config) -> Vec<CheckResult> {
    if config.storage.is_empty() {
        return vec![CheckResult::new("Storage", CheckStatus::Warn, "no destination configured")
            .with_fix("Add a storage entry to the configuration")];
    }

    config
        .storage
        .iter()
        .map(|storage| {
            let name = format!("Storage '{}'", storage.name);
            match build_backend(storage) {
                Ok(backend) if backend.is_available() => CheckResult::new(
                    name,
                    CheckStatus::Ok,
                    format!("{} {}", backend.backend_type(), backend.location("")),
                ),
                Ok(backend) => CheckResult::new(
                    name,
                    CheckStatus::Fail,
                    format!("{} client not found on PATH", backend.backend_type()),
                )
                .with_fix("Install the aws or swift CLI"),
                Err(e) => CheckResult::new(name, CheckStatus::Fail, e.to_string()),
            }
        })
        .collect()
}

fn check_notifications(config: &Config) -> CheckResult {
    match WebhookNotifier::from_config(&config.notifications) {
        Ok(Some(notifier)) => CheckResult::new(
            "Notifications",
            CheckStatus::Ok,
            format!("webhook to {}", notifier.host()),
        ),
        Ok(None) => CheckResult::new("Notifications", CheckStatus::Skip, "no webhook configured"),
        Err(e) => CheckResult::new("Notifications", CheckStatus::Fail, e.to_string()),
    }
}

fn check_workdir(dir: &Path) -> CheckResult {
    let probe = std::fs::create_dir_all(dir).and_then(|_| tempfile_in(dir));
    match probe {
        Ok(()) => CheckResult::new("Work directory", CheckStatus::Ok, dir.display().to_string()),
        Err(e) => CheckResult::new(
            "Work directory",
            CheckStatus::Fail,
            format!("{}: {}", dir.display(), e),
        )
        .with_fix("Set workdir to a writable directory"),
    }
}

fn tempfile_in(dir: &Path) -> std::io::Result<()> {
    let probe = dir.join(format!(".kubackup-doctor-{}", std::process::id()));
    std::fs::write(&probe, b"")?;
    std::fs::remove_file(&probe)
}

fn print_results(summary: &DoctorSummary) {
    for check in &summary.checks {
        let icon = status_icon(check.status);
        let msg = check.message.as_deref().unwrap_or("");
        let name = match check.status {
            CheckStatus::Ok => style(&check.name).green(),
            CheckStatus::Warn => style(&check.name).yellow(),
            CheckStatus::Fail => style(&check.name).red(),
            CheckStatus::Skip => style(&check.name).dim(),
        };
        println!("  {} {} {}", icon, name, style(msg).dim());
        if matches!(check.status, CheckStatus::Fail | CheckStatus::Warn) {
            if let Some(fix) = &check.fix_suggestion {
                println!("      {}", style(fix).dim());
            }
        }
    }

    println!();
    if summary.fail_count == 0 && summary.warn_count == 0 {
        println!(
            "{} All {} checks passed!",
            style("✓").green().bold(),
            summary.ok_count
        );
    } else {
        println!(
            "Summary: {} ok, {} warnings, {} failed, {} skipped",
            style(summary.ok_count).green(),
            style(summary.warn_count).yellow(),
            style(summary.fail_count).red(),
            style(summary.skip_count).dim(),
        );
    }
}

fn status_icon(status: CheckStatus) -> console::StyledObject<&'static str> {
    match status {
        CheckStatus::Ok => style("[OK]").green(),
        CheckStatus::Warn => style("[WARN]").yellow(),
        CheckStatus::Fail => style("[FAIL]").red(),
        CheckStatus::Skip => style("[SKIP]").dim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubackup_core::config::NotificationConfig;

    #[test]
    fn test_summary_counts() {
        let summary = DoctorSummary::new(vec![
            CheckResult::new("a", CheckStatus::Ok, ""),
            CheckResult::new("b", CheckStatus::Fail, ""),
            CheckResult::new("c", CheckStatus::Skip, ""),
            CheckResult::new("d", CheckStatus::Ok, ""),
        ]);
        assert_eq!(summary.ok_count, 2);
        assert_eq!(summary.fail_count, 1);
        assert_eq!(summary.skip_count, 1);
        assert_eq!(summary.warn_count, 0);
    }

    #[test]
    fn test_workdir_check() {
        let dir = tempfile::TempDir::new().unwrap();
        let check = check_workdir(&dir.path().join("staging"));
        assert_eq!(check.status, CheckStatus::Ok);
        assert!(dir.path().join("staging").is_dir());
    }

    #[test]
    fn test_notification_check() {
        let mut config = Config::default();
        assert_eq!(check_notifications(&config).status, CheckStatus::Skip);

        config.notifications = NotificationConfig {
            webhook_url: Some("https://chat.example.com/hooks/x".to_string()),
            ..Default::default()
        };
        let check = check_notifications(&config);
        assert_eq!(check.status, CheckStatus::Ok);
        assert_eq!(check.message.as_deref(), Some("webhook to chat.example.com"));
    }

    #[test]
    fn test_no_storage_warns() {
        let checks = check_storage(&Config::default());
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].status, CheckStatus::Warn);
    }
}
