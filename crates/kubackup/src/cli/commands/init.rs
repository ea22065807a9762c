//! Init command

use std::path::{Path, PathBuf};

use clap::Args;
use dialoguer::{Confirm, Select};
use tracing::info;

use kubackup_core::config::{Config, ConfigFormat, DEFAULT_CONFIG_TEMPLATE, DEFAULT_CONFIG_YAML};

use crate::cli::{output, Cli};
use crate::exit_codes::CliError;

/// Write a starter kubackup.yaml (or .toml)
#[derive(Debug, Args)]
pub struct InitCommand {
    /// Replace an existing file without asking
    #[arg(short, long)]
    pub force: bool,

    /// Never prompt; write YAML unless the path ends in .toml
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Where to write the file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Starter configuration in the given syntax
fn render_template(format: ConfigFormat) -> anyhow::Result<String> {
    match format {
        ConfigFormat::Yaml => Ok(DEFAULT_CONFIG_TEMPLATE.to_string()),
        ConfigFormat::Toml => {
            let config: Config = serde_yaml::from_str(DEFAULT_CONFIG_TEMPLATE)?;
            Ok(toml::to_string_pretty(&config)?)
        }
    }
}

impl InitCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let target = match &self.output {
            Some(path) => path.clone(),
            None => std::env::current_dir()?.join(DEFAULT_CONFIG_YAML),
        };
        info!(path = %target.display(), force = self.force, "writing starter config");

        if target.exists() && !self.force {
            self.confirm_overwrite(&target)?;
        }

        let format = self.choose_format(&target)?;
        let target = match format {
            ConfigFormat::Toml if ConfigFormat::of(&target) == ConfigFormat::Yaml => {
                target.with_extension("toml")
            }
            _ => target,
        };

        if let Some(dir) = target.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&target, render_template(format)?)?;

        if !cli.quiet {
            output::success(&format!(
                "Wrote {}",
                output::path_style().apply_to(target.display())
            ));
            println!();
            println!("{}", output::header("Then:"));
            println!("  - describe your storage and targets in {}", target.display());
            println!("  - kubackup doctor");
            println!("  - kubackup run --dry-run");
        }
        Ok(())
    }

    fn confirm_overwrite(&self, target: &Path) -> anyhow::Result<()> {
        if self.yes {
            anyhow::bail!("{} exists; pass --force to replace it", target.display());
        }
        let replace = Confirm::new()
            .with_prompt(format!("{} exists. Replace it?", target.display()))
            .default(false)
            .interact()?;
        if replace {
            Ok(())
        } else {
            output::warning("Left the existing file untouched");
            Err(CliError::Cancelled.into())
        }
    }

    fn choose_format(&self, target: &Path) -> anyhow::Result<ConfigFormat> {
        if ConfigFormat::of(target) == ConfigFormat::Toml || self.yes {
            return Ok(ConfigFormat::of(target));
        }
        let choice = Select::new()
            .with_prompt("File syntax")
            .items(&["YAML", "TOML"])
            .default(0)
            .interact()?;
        Ok(if choice == 1 {
            ConfigFormat::Toml
        } else {
            ConfigFormat::Yaml
        })
    }
}
