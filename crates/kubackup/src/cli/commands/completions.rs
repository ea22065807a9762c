//! Shell completions

use std::io;
use std::path::PathBuf;

use clap::{Args, CommandFactory};
use clap_complete::{generate, Shell};
use tracing::info;

use crate::cli::{output, Cli};

/// Generate shell completions
#[derive(Debug, Args)]
pub struct CompletionsCommand {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl CompletionsCommand {
    /// Execute the completions command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(shell = %self.shell, "executing completions command");
        let mut cmd = Cli::command();
        let bin = cmd.get_name().to_string();

        match &self.output {
            Some(path) => {
                let mut file = std::fs::File::create(path)?;
                generate(self.shell, &mut cmd, bin, &mut file);
                if !cli.quiet {
                    output::success(&format!(
                        "{} completions written to {}",
                        self.shell,
                        path.display()
                    ));
                }
            }
            None => generate(self.shell, &mut cmd, bin, &mut io::stdout()),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completions_mention_commands() {
        let mut cmd = Cli::command();
        let mut buf = Vec::new();
        generate(Shell::Bash, &mut cmd, "kubackup", &mut buf);

        let script = String::from_utf8(buf).unwrap();
        assert!(script.contains("kubackup"));
        assert!(script.contains("prune"));
    }
}
