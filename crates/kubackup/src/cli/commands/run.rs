//! Run command

use std::sync::Arc;

use clap::Args;
use console::style;
use tracing::info;

use kubackup_tasks::{
    BackupReporterRegistry, RunOptions, RunSummary, TargetStatus, TracingReporter,
};

use crate::cli::output::{self, format_bytes, ConsoleReporter};
use crate::cli::{Cli, OutputFormat, Session};
use crate::exit_codes::CliError;

/// Back up targets
#[derive(Debug, Args)]
pub struct RunCommand {
    /// Targets to back up (all when omitted)
    pub targets: Vec<String>,

    /// Resolve pods and keys without dumping, uploading or deleting
    #[arg(long)]
    pub dry_run: bool,

    /// Do not apply retention after uploading
    #[arg(long)]
    pub no_prune: bool,

    /// Do not send the notification
    #[arg(long)]
    pub no_notify: bool,

    /// Keep going after a target fails
    #[arg(long)]
    pub continue_on_error: bool,
}

impl RunCommand {
    /// Execute the run command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.execute_async(cli))
    }

    fn options(&self) -> RunOptions {
        RunOptions {
            dry_run: self.dry_run,
            prune: !self.no_prune,
            notify: !self.no_notify,
            continue_on_error: self.continue_on_error,
        }
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(
            targets = ?self.targets,
            dry_run = self.dry_run,
            "executing run command"
        );
        let session = Session::open(cli)?;
        let tasks = session.tasks(&self.targets)?;

        let mut reporters = BackupReporterRegistry::empty();
        reporters.register(TracingReporter);
        if cli.show_text() {
            reporters.register(ConsoleReporter);
        }

        let runner = session.runner(self.options(), Arc::new(reporters))?;

        if cli.show_text() {
            output::info(&format!(
                "Using {} ({} target(s))",
                session.config_path.display(),
                tasks.len()
            ));
        }
        if cli.show_text() && self.dry_run {
            output::warning("Dry run: nothing is dumped, uploaded or deleted");
            println!();
        }

        let summary = runner.run(&tasks).await;

        match cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            OutputFormat::Text => {
                if !cli.quiet {
                    print_summary(&summary);
                }
            }
        }

        if !summary.is_success() {
            return Err(CliError::RunFailed {
                message: summary.headline(),
                failure: summary.first_failure(),
            }
            .into());
        }

        Ok(())
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    for report in &summary.reports {
        let detail = match report.status {
            TargetStatus::Succeeded => {
                let size = report.size_bytes.map(format_bytes).unwrap_or_default();
                format!(
                    "{} {}",
                    report.key.as_deref().unwrap_or("-"),
                    style(size).dim()
                )
            }
            TargetStatus::Failed => report.error.clone().unwrap_or_default(),
            TargetStatus::Skipped => report.skip_reason.clone().unwrap_or_default(),
        };
        let icon = match report.status {
            TargetStatus::Succeeded => style("✓").green(),
            TargetStatus::Failed => style("✗").red(),
            TargetStatus::Skipped => style("-").dim(),
        };
        println!("  {} {:<20} {}", icon, report.target, detail);
    }
    println!();

    // Failures are printed by main along with the exit code.
    if summary.is_success() {
        output::success(&format!(
            "{} ({:.1}s)",
            summary.headline(),
            summary.duration().as_secs_f64()
        ));
    }
}
