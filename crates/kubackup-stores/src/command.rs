//! Execution of the wrapped storage CLIs

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, StoreError};

/// Captured output of a finished command
#[derive(Debug)]
pub(crate) struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Build a command for `program` with `args`
pub(crate) fn build(program: &str, args: &[String]) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);
    cmd
}

/// Run a command to completion, failing on a non-zero exit status
pub(crate) async fn run(
    program: &str,
    args: &[String],
    timeout: Option<Duration>,
) -> Result<CommandOutput> {
    let description = format!("{} {}", program, args.first().map(String::as_str).unwrap_or(""));
    debug!(program, ?args, "running storage command");

    let mut cmd = build(program, args);
    let future = cmd.output();

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| StoreError::Timeout(format!("{} after {}s", description, limit.as_secs())))?,
        None => future.await,
    }
    .map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StoreError::ToolNotFound(program.to_string())
        } else {
            StoreError::CommandFailed {
                command: description.clone(),
                message: e.to_string(),
            }
        }
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if !stderr.trim().is_empty() {
        debug!(program, stderr = %stderr.trim(), "storage command stderr");
    }

    if !output.status.success() {
        let message = if stderr.trim().is_empty() {
            format!("exited with {}", output.status)
        } else {
            stderr.trim().to_string()
        };
        return Err(StoreError::CommandFailed {
            command: description,
            message,
        });
    }

    Ok(CommandOutput { stdout, stderr })
}
