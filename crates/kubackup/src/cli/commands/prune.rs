//! Prune command

use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use console::style;
use dialoguer::Confirm;
use tracing::info;

use kubackup_tasks::{BackupRunner, BackupTask, PruneOutcome, RunOptions, TracingReporter};

use crate::cli::output::{self, header, path_style};
use crate::cli::{Cli, OutputFormat, Session};
use crate::exit_codes::CliError;

/// Apply retention to stored snapshots
#[derive(Debug, Args)]
pub struct PruneCommand {
    /// Targets to prune (all when omitted)
    pub targets: Vec<String>,

    /// Keep this many snapshots instead of the configured number
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub keep_last: Option<u64>,

    /// Show what would be deleted without deleting
    #[arg(long)]
    pub dry_run: bool,

    /// Delete without asking
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl PruneCommand {
    /// Execute the prune command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(
            targets = ?self.targets,
            keep_last = ?self.keep_last,
            dry_run = self.dry_run,
            "executing prune command"
        );
        let session = Session::open(cli)?;
        let tasks = session.tasks(&self.targets)?;

        let preview_options = RunOptions {
            dry_run: true,
            ..Default::default()
        };
        let preview = session.runner(preview_options, Arc::new(TracingReporter))?;
        let planned = self.prune_all(&preview, &tasks).await?;
        let doomed: usize = planned.iter().map(|o| o.deleted.len()).sum();

        if self.dry_run || doomed == 0 {
            self.print(cli, &planned)?;
            if doomed == 0 && cli.show_text() {
                output::info("Nothing to prune");
            }
            return Ok(());
        }

        if !self.yes {
            if !console::Term::stdout().is_term() {
                anyhow::bail!(
                    "Refusing to delete {} snapshot(s) without a terminal; pass --yes",
                    doomed
                );
            }
            self.print(cli, &planned)?;
            let confirmed = Confirm::new()
                .with_prompt(format!("Delete {} snapshot(s)?", doomed))
                .default(false)
                .interact()?;

            if !confirmed {
                println!("{}", style("Aborted.").yellow());
                return Err(CliError::Cancelled.into());
            }
        }

        let runner = session.runner(RunOptions::default(), Arc::new(TracingReporter))?;
        let outcomes = self.prune_all(&runner, &tasks).await?;
        self.print(cli, &outcomes)?;

        if cli.show_text() {
            let deleted: usize = outcomes.iter().map(|o| o.deleted.len()).sum();
            output::success(&format!("Deleted {} snapshot(s)", deleted));
        }
        Ok(())
    }

    async fn prune_all(
        &self,
        runner: &BackupRunner,
        tasks: &[BackupTask],
    ) -> anyhow::Result<Vec<PruneOutcome>> {
        let keep_last = self.keep_last.map(|n| n as usize);
        let mut outcomes = Vec::with_capacity(tasks.len());
        for task in tasks {
            let outcome = runner
                .prune_target(task, keep_last)
                .await
                .with_context(|| format!("applying retention to {}", task.name))?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    fn print(&self, cli: &Cli, outcomes: &[PruneOutcome]) -> anyhow::Result<()> {
        match cli.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcomes)?),
            OutputFormat::Text => {
                if !cli.quiet {
                    outcomes.iter().for_each(print_outcome);
                }
            }
        }
        Ok(())
    }
}

fn print_outcome(outcome: &PruneOutcome) {
    println!(
        "{} {}",
        header(&outcome.target),
        style(format!(
            "{}:{}",
            outcome.storage,
            path_style().apply_to(&outcome.prefix)
        ))
        .dim()
    );

    let verb = if outcome.dry_run { "would delete" } else { "deleted" };
    for key in &outcome.deleted {
        println!("  {} {} {}", style("-").red(), style(verb).dim(), key);
    }
    for object in &outcome.plan.ignored {
        println!("  {} {} {}", style("?").yellow(), style("not a snapshot").dim(), object.key);
    }
    println!(
        "  {} kept, {} {}",
        outcome.plan.keep.len(),
        outcome.deleted.len(),
        verb
    );
    println!();
}
