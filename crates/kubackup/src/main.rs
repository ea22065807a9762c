//! kubackup - Back up data from Kubernetes pods to object storage

mod cli;
mod exit_codes;

use clap::Parser;
use tracing_subscriber::{
    layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer,
};

use cli::Cli;

/// Crates whose logs `-v` raises to info
const CRATES: &[&str] = &[
    "kubackup",
    "kubackup_core",
    "kubackup_cluster",
    "kubackup_stores",
    "kubackup_notify",
    "kubackup_tasks",
];

fn main() {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.verbose, cli.quiet);

    if let Err(err) = cli.execute() {
        let code = exit_codes::for_error(&err);
        if code != exit_codes::CANCELLED {
            cli::output::error(&format!("{:#}", err));
        }
        std::process::exit(code);
    }
}

/// Set up tracing with two layers:
/// - Console (stderr): RUST_LOG, else `warn`; `-v` gives info for our crates.
///   JSON lines when `KUBACKUP_LOG_FORMAT=json`.
/// - File: always debug-level JSON to ~/.kubackup/logs/
fn init_tracing(verbose: bool, quiet: bool) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose, quiet)));
    let json = std::env::var("KUBACKUP_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if let Some(log_dir) = log_directory() {
        let file_appender = tracing_appender::rolling::daily(&log_dir, "kubackup.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::registry()
            .with(console_layer(json, console_filter))
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_target(true)
                    .with_filter(EnvFilter::new("debug")),
            )
            .init();

        return Some(guard);
    }

    // Fallback: console only
    tracing_subscriber::registry()
        .with(console_layer(json, console_filter))
        .init();

    None
}

fn console_layer<S>(json: bool, filter: EnvFilter) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed()
    }
}

fn default_directives(verbose: bool, quiet: bool) -> String {
    if quiet {
        return "error".to_string();
    }
    if !verbose {
        return "warn".to_string();
    }
    std::iter::once("warn".to_string())
        .chain(CRATES.iter().map(|c| format!("{}=info", c)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Returns the log directory path, creating it if needed.
fn log_directory() -> Option<std::path::PathBuf> {
    let log_dir = dirs::home_dir()?.join(".kubackup").join("logs");
    std::fs::create_dir_all(&log_dir).ok()?;
    Some(log_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(default_directives(false, false), "warn");
        assert_eq!(default_directives(true, true), "error");

        let verbose = default_directives(true, false);
        assert!(verbose.starts_with("warn,"));
        assert!(verbose.contains("kubackup_tasks=info"));
        assert!(EnvFilter::try_new(&verbose).is_ok());
    }
}
