//! Targets command

use std::sync::Arc;

use clap::Args;
use console::style;
use serde::Serialize;
use tracing::info;

use kubackup_tasks::{BackupTask, PlannedTarget, RunOptions, TracingReporter};

use crate::cli::output::{header, path_style};
use crate::cli::{Cli, OutputFormat, Session};

/// Show targets with the pod and key a backup would use
#[derive(Debug, Args)]
pub struct TargetsCommand {
    /// Targets to show (all when omitted)
    pub targets: Vec<String>,

    /// Do not contact the cluster; show configuration only
    #[arg(long)]
    pub offline: bool,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum TargetsOutput {
    Configured(Vec<BackupTask>),
    Planned(Vec<PlannedTarget>),
}

impl TargetsCommand {
    /// Execute the targets command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(offline = self.offline, "executing targets command");
        let session = Session::open(cli)?;
        let tasks = session.tasks(&self.targets)?;

        let output = if self.offline {
            TargetsOutput::Configured(tasks)
        } else {
            let options = RunOptions {
                dry_run: true,
                ..Default::default()
            };
            let runner = session.runner(options, Arc::new(TracingReporter))?;
            TargetsOutput::Planned(runner.plan_targets(&tasks).await)
        };

        match cli.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
            OutputFormat::Text => {
                if cli.quiet {
                    return Ok(());
                }
                println!("{}", header("Targets"));
                println!();
                match &output {
                    TargetsOutput::Configured(tasks) => tasks.iter().for_each(print_task),
                    TargetsOutput::Planned(planned) => planned.iter().for_each(print_planned),
                }
            }
        }

        Ok(())
    }
}

fn disabled_marker(enabled: bool) -> String {
    if enabled {
        String::new()
    } else {
        style(" (disabled)").yellow().to_string()
    }
}

fn print_task(task: &BackupTask) {
    println!(
        "  {} {}{}",
        style(&task.name).bold(),
        style(format!("[{}]", task.kind)).dim(),
        disabled_marker(task.enabled)
    );
    println!(
        "    {} {} in {}",
        style("source:").dim(),
        task.target().pod_source(),
        task.namespace
    );
    println!("    {} {}", style("storage:").dim(), task.storage);
    println!();
}

fn print_planned(planned: &PlannedTarget) {
    println!(
        "  {} {}{}",
        style(&planned.target).bold(),
        style(format!("[{}]", planned.kind)).dim(),
        disabled_marker(planned.enabled)
    );
    println!(
        "    {} {} in {}",
        style("source:").dim(),
        planned.source,
        planned.namespace
    );
    match (&planned.pod, &planned.key, &planned.error) {
        (Some(pod), Some(key), _) => {
            println!("    {} {}", style("pod:").dim(), pod);
            println!(
                "    {} {}:{}",
                style("key:").dim(),
                planned.storage,
                path_style().apply_to(key)
            );
        }
        (_, _, Some(error)) => println!("    {} {}", style("error:").red(), error),
        _ => {}
    }
    println!();
}
