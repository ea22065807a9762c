//! CLI definition and command handling

pub mod commands;
pub mod output;
mod session;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{
    CompletionsCommand, DoctorCommand, FetchCommand, InitCommand, ListCommand, PruneCommand,
    RunCommand, TargetsCommand, ValidateCommand,
};

pub use session::Session;

/// kubackup - Back up data from Kubernetes pods to object storage
#[derive(Debug, Parser)]
#[command(name = "kubackup")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Working directory
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<PathBuf>,

    /// Configuration file (skips the search)
    #[arg(long, global = true, env = "KUBACKUP_CONFIG")]
    pub config: Option<PathBuf>,

    /// kubeconfig context
    #[arg(long, global = true, env = "KUBACKUP_CONTEXT")]
    pub context: Option<String>,

    /// kubeconfig file
    #[arg(long, global = true)]
    pub kubeconfig: Option<PathBuf>,

    /// Notification webhook URL
    #[arg(long, global = true, env = "KUBACKUP_WEBHOOK_URL", hide_env_values = true)]
    pub webhook_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Back up targets
    Run(RunCommand),

    /// Show targets with the pod and key a backup would use
    Targets(TargetsCommand),

    /// List stored snapshots
    List(ListCommand),

    /// Apply retention to stored snapshots
    Prune(PruneCommand),

    /// Download a stored snapshot
    Fetch(FetchCommand),

    /// Validate configuration
    Validate(ValidateCommand),

    /// Check the environment for required tools
    Doctor(DoctorCommand),

    /// Create a configuration file
    Init(InitCommand),

    /// Generate shell completions
    Completions(CompletionsCommand),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> anyhow::Result<()> {
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)?;
        }

        match self.command {
            Commands::Run(ref cmd) => cmd.execute(&self),
            Commands::Targets(ref cmd) => cmd.execute(&self),
            Commands::List(ref cmd) => cmd.execute(&self),
            Commands::Prune(ref cmd) => cmd.execute(&self),
            Commands::Fetch(ref cmd) => cmd.execute(&self),
            Commands::Validate(ref cmd) => cmd.execute(&self),
            Commands::Doctor(ref cmd) => cmd.execute(&self),
            Commands::Init(ref cmd) => cmd.execute(&self),
            Commands::Completions(ref cmd) => cmd.execute(&self),
        }
    }

    /// Whether human-readable progress should be printed
    pub fn show_text(&self) -> bool {
        !self.quiet && self.format == OutputFormat::Text
    }
}
