//! Fetch command

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use tracing::info;

use kubackup_stores::StorageRegistry;
use kubackup_tasks::TaskError;

use crate::cli::output::{self, format_bytes, path_style};
use crate::cli::{Cli, OutputFormat, Session};

/// Download a stored snapshot
#[derive(Debug, Args)]
pub struct FetchCommand {
    /// Object key of the snapshot
    pub key: String,

    /// Destination file (defaults to the key's file name)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Storage destination (defaults to the first configured)
    #[arg(long)]
    pub storage: Option<String>,

    /// Overwrite an existing file
    #[arg(short, long)]
    pub force: bool,
}

impl FetchCommand {
    /// Execute the fetch command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.execute_async(cli))
    }

    fn destination(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(default_file_name(&self.key)))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(key = %self.key, storage = ?self.storage, "executing fetch command");
        let session = Session::open(cli)?;
        let stores = StorageRegistry::from_configs(&session.config.storage)?;
        let backend = stores.resolve(self.storage.as_deref()).ok_or_else(|| match &self.storage {
            Some(name) => TaskError::UnknownStorage(name.clone()),
            None => TaskError::NoStorage,
        })?;

        let dest = self.destination();
        if dest.exists() && !self.force {
            anyhow::bail!(
                "{} already exists. Use --force to overwrite.",
                dest.display()
            );
        }

        backend
            .download(&self.key, &dest)
            .await
            .with_context(|| format!("fetching {}", backend.location(&self.key)))?;
        let size = std::fs::metadata(&dest).map(|m| m.len()).unwrap_or(0);

        match cli.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "key": self.key,
                    "storage": backend.name(),
                    "location": backend.location(&self.key),
                    "path": dest,
                    "size_bytes": size,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Text => {
                if !cli.quiet {
                    output::success(&format!(
                        "Fetched {} to {} ({})",
                        backend.location(&self.key),
                        path_style().apply_to(dest.display()),
                        format_bytes(size)
                    ));
                }
            }
        }

        Ok(())
    }
}

fn default_file_name(key: &str) -> &str {
    Path::new(key)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_destination() {
        let cmd = FetchCommand {
            key: "kubackup/prod/postgres/20240101T000000Z.sql.gz".to_string(),
            output: None,
            storage: None,
            force: false,
        };
        assert_eq!(cmd.destination(), PathBuf::from("20240101T000000Z.sql.gz"));

        let cmd = FetchCommand {
            output: Some(PathBuf::from("/tmp/restore.sql.gz")),
            ..cmd
        };
        assert_eq!(cmd.destination(), PathBuf::from("/tmp/restore.sql.gz"));
    }
}
