//! Terminal output helpers shared by the commands

use console::{style, Style};

use kubackup_tasks::{BackupEvent, BackupReporter};

fn mark(symbol: &str, color: Style, message: &str) -> String {
    format!("{} {}", color.bold().apply_to(symbol), message)
}

pub fn success(message: &str) {
    println!("{}", mark("✓", Style::new().green(), message));
}

/// Errors go to stderr so `--format json` output stays parseable
pub fn error(message: &str) {
    eprintln!("{}", mark("✗", Style::new().red(), message));
}

pub fn warning(message: &str) {
    println!("{}", mark("!", Style::new().yellow(), message));
}

pub fn info(message: &str) {
    println!("{} {}", style("•").blue(), message);
}

pub fn header(text: &str) -> String {
    style(text).bold().underlined().to_string()
}

/// Indented `key: value` line with a dimmed key
pub fn key_value(key: &str, value: &str) -> String {
    format!("  {:<12} {}", style(format!("{}:", key)).dim(), value)
}

/// Style for object keys and paths
pub fn path_style() -> Style {
    Style::new().cyan()
}

/// Style for target names
pub fn target_style() -> Style {
    Style::new().bold()
}

/// Human-readable byte size
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Prints run progress to the terminal
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl BackupReporter for ConsoleReporter {
    fn report(&self, event: &BackupEvent) {
        match event {
            BackupEvent::TargetStarted { target, namespace } => {
                println!(
                    "{} {} {}",
                    style("→").blue(),
                    target_style().apply_to(target),
                    style(format!("({})", namespace)).dim()
                );
            }
            BackupEvent::PodSelected { pod, .. } => {
                println!("{}", key_value("pod", pod));
            }
            BackupEvent::DumpCompleted {
                bytes, duration, ..
            } => {
                println!(
                    "{}",
                    key_value(
                        "dump",
                        &format!("{} in {:.1}s", format_bytes(*bytes), duration.as_secs_f64())
                    )
                );
            }
            BackupEvent::Uploaded {
                location,
                size_bytes,
                ..
            } => {
                println!(
                    "{}",
                    key_value(
                        "stored",
                        &format!(
                            "{} ({})",
                            path_style().apply_to(location),
                            format_bytes(*size_bytes)
                        )
                    )
                );
            }
            BackupEvent::Pruned { deleted, kept, .. } => {
                if *deleted > 0 {
                    println!(
                        "{}",
                        key_value("retention", &format!("{} removed, {} kept", deleted, kept))
                    );
                }
            }
            BackupEvent::TargetFailed { target, error, .. } => {
                eprintln!(
                    "{} {}: {}",
                    style("✗").red().bold(),
                    target_style().apply_to(target),
                    error
                );
            }
            BackupEvent::TargetSkipped { target, reason } => {
                println!(
                    "{} {} {}",
                    style("-").dim(),
                    style(target).dim(),
                    style(format!("skipped: {}", reason)).dim()
                );
            }
            BackupEvent::RunCompleted { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.0 GiB");
    }
}
