//! Validate command

use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::info;

use kubackup_core::config::{config_warnings, find_config, parse_config, validate_config, Config};
use kubackup_notify::WebhookNotifier;
use kubackup_stores::StorageRegistry;
use kubackup_tasks::BackupTask;

use crate::cli::session::apply_overrides;
use crate::cli::{Cli, OutputFormat};
use crate::exit_codes::CliError;

/// Validate configuration
#[derive(Debug, Args)]
pub struct ValidateCommand {
    /// Strict mode - treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

/// Findings of a validation pass
#[derive(Debug, Default)]
struct Findings {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl Findings {
    fn check(config: &Config) -> Self {
        let mut findings = Self::default();

        if let Err(e) = validate_config(config) {
            findings.errors.push(format!("Configuration validation: {}", e));
        }
        findings.warnings.extend(config_warnings(config));

        if let Err(e) = StorageRegistry::from_configs(&config.storage) {
            findings.errors.push(format!("Storage: {}", e));
        }
        if let Err(e) = BackupTask::resolve_all(config, &[]) {
            findings.errors.push(format!("Targets: {}", e));
        }
        if let Err(e) = WebhookNotifier::from_config(&config.notifications) {
            findings.errors.push(format!("Notifications: {}", e));
        }

        findings
    }
}

impl ValidateCommand {
    /// Execute the validate command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(strict = self.strict, "executing validate command");
        let cwd = std::env::current_dir()?;

        let mut findings = Findings::default();
        let config_path: Option<PathBuf> = cli.config.clone().or_else(|| find_config(&cwd));

        match &config_path {
            None => findings
                .errors
                .push(format!("Configuration: no configuration file found from {}", cwd.display())),
            Some(path) => match std::fs::read_to_string(path) {
                Err(e) => findings
                    .errors
                    .push(format!("Configuration: cannot read {}: {}", path.display(), e)),
                Ok(content) => match parse_config(path, &content) {
                    Err(e) => findings.errors.push(format!("Configuration: {}", e)),
                    Ok(mut config) => {
                        apply_overrides(cli, &mut config);
                        let checked = Findings::check(&config);
                        findings.errors.extend(checked.errors);
                        findings.warnings.extend(checked.warnings);
                    }
                },
            },
        }

        let Findings {
            mut errors,
            mut warnings,
        } = findings;

        // If strict, promote warnings to errors
        if self.strict {
            errors.append(&mut warnings);
        }

        let passed = errors.is_empty();

        match cli.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "valid": passed,
                    "config_path": config_path.map(|p| p.to_string_lossy().to_string()),
                    "errors": errors,
                    "warnings": warnings
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Text => {
                if !cli.quiet {
                    println!("{}", style("Validation Results").bold());
                    println!();

                    if let Some(path) = &config_path {
                        println!("Config: {}", style(path.display()).cyan());
                        println!();
                    }

                    if !errors.is_empty() {
                        println!("{}", style("Errors:").red().bold());
                        for error in &errors {
                            println!("  {} {}", style("✗").red(), error);
                        }
                        println!();
                    }

                    if !warnings.is_empty() {
                        println!("{}", style("Warnings:").yellow().bold());
                        for warning in &warnings {
                            println!("  {} {}", style("!").yellow(), warning);
                        }
                        println!();
                    }

                    if passed {
                        if warnings.is_empty() {
                            println!("{}", style("✓ All checks passed").green().bold());
                        } else {
                            println!(
                                "{} with {} warning(s)",
                                style("✓ Validation passed").green().bold(),
                                warnings.len()
                            );
                        }
                    }
                }
            }
        }

        if !passed {
            return Err(CliError::Validation(errors.len()).into());
        }

        Ok(())
    }
}
