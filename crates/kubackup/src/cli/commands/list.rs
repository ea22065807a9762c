//! List command

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Args;
use console::style;
use serde::Serialize;
use tracing::info;

use kubackup_core::naming::parse_snapshot_timestamp;
use kubackup_stores::StoredObject;
use kubackup_tasks::{RunOptions, TracingReporter};

use crate::cli::output::{format_bytes, header, path_style};
use crate::cli::{Cli, OutputFormat, Session};

/// List stored snapshots
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Targets to list (all when omitted)
    pub targets: Vec<String>,
}

#[derive(Debug, Serialize)]
struct TargetSnapshots {
    target: String,
    storage: String,
    prefix: String,
    snapshots: Vec<SnapshotEntry>,
}

#[derive(Debug, Serialize)]
struct SnapshotEntry {
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    taken_at: Option<DateTime<Utc>>,
}

impl SnapshotEntry {
    fn new(object: StoredObject, prefix: &str) -> Self {
        let taken_at = parse_snapshot_timestamp(&object.key, prefix).or(object.last_modified);
        Self {
            key: object.key,
            size: object.size,
            taken_at,
        }
    }
}

impl ListCommand {
    /// Execute the list command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(targets = ?self.targets, "executing list command");
        let session = Session::open(cli)?;
        let tasks = session.tasks(&self.targets)?;
        let runner = session.runner(RunOptions::default(), Arc::new(TracingReporter))?;

        let mut listings = Vec::with_capacity(tasks.len());
        for task in &tasks {
            let (located, objects) = runner
                .list_snapshots(task)
                .await
                .with_context(|| format!("listing snapshots of {}", task.name))?;
            listings.push(TargetSnapshots {
                target: task.name.clone(),
                storage: task.storage.clone(),
                snapshots: objects
                    .into_iter()
                    .map(|o| SnapshotEntry::new(o, &located.prefix))
                    .collect(),
                prefix: located.prefix,
            });
        }

        match cli.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&listings)?),
            OutputFormat::Text => {
                if !cli.quiet {
                    listings.iter().for_each(print_listing);
                }
            }
        }

        Ok(())
    }
}

fn print_listing(listing: &TargetSnapshots) {
    println!(
        "{} {}",
        header(&listing.target),
        style(format!(
            "{}:{}",
            listing.storage,
            path_style().apply_to(&listing.prefix)
        ))
        .dim()
    );

    if listing.snapshots.is_empty() {
        println!("  {}", style("no snapshots").dim());
    }
    for snapshot in &listing.snapshots {
        let name = snapshot
            .key
            .strip_prefix(&listing.prefix)
            .unwrap_or(&snapshot.key);
        let taken = snapshot
            .taken_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "-".to_string());
        let size = snapshot.size.map(format_bytes).unwrap_or_default();
        println!("  {:<40} {:<24} {}", name, taken, style(size).dim());
    }
    println!();
}
