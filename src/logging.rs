//! Logging for sdvault.
//!
//! Two layers: `init` wires the `tracing` subscriber for diagnostics (pretty
//! console or JSON), and `RunLog` is the per-run file sink the pipeline
//! writes task lines and the summary block to.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Configuration for the tracing subscriber.
#[derive(Default)]
pub struct LogConfig {
    /// Output logs as JSON (for machine parsing)
    pub json: bool,
    /// Enable verbose logging (sets default level to DEBUG)
    pub verbose: bool,
}

/// Initialize the tracing subscriber with the given configuration.
///
/// Called once early in main(). The log level can be overridden at runtime
/// via the `RUST_LOG` environment variable.
pub fn init(config: LogConfig) {
    let default_level = if config.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("sdvault={}", default_level.as_str().to_lowercase()))
    });

    if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_span_events(FmtSpan::CLOSE)
                    .with_current_span(true)
                    .with_target(true),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .init();
    }
}

/// One line in the run log.
#[derive(Debug, Serialize)]
struct LogEntry {
    timestamp: DateTime<Utc>,
    level: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<crate::core::models::CopyAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl LogEntry {
    fn message(level: &'static str, message: String) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message,
            source: None,
            dest: None,
            action: None,
            error: None,
        }
    }
}

/// Append-only per-run log file. Writes are serialized by a mutex so lines
/// from the drain loop never interleave.
pub struct RunLog {
    file: Mutex<File>,
    json: bool,
}

impl RunLog {
    /// Open (appending) the log file, creating parent directories.
    pub fn open(path: &Path, json: bool) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;

        Ok(Self {
            file: Mutex::new(file),
            json,
        })
    }

    pub fn info(&self, message: impl Into<String>) {
        self.write(LogEntry::message("INFO", message.into()));
    }

    pub fn error(&self, message: impl Into<String>, error: &anyhow::Error) {
        let mut entry = LogEntry::message("ERROR", message.into());
        entry.error = Some(format!("{error:#}"));
        self.write(entry);
    }

    /// Record the outcome of one copy task.
    pub fn task(&self, task: &crate::core::models::CopyTask) {
        let mut entry = LogEntry::message(
            if task.error.is_empty() { "INFO" } else { "ERROR" },
            format!(
                "{}: {} -> {}",
                task.action,
                task.source.name,
                task.dest_path.display()
            ),
        );
        entry.source = Some(task.source.path.to_string_lossy().to_string());
        entry.dest = Some(task.dest_path.to_string_lossy().to_string());
        entry.action = Some(task.action);
        if !task.error.is_empty() {
            entry.error = Some(task.error.clone());
        }
        self.write(entry);
    }

    /// Write the run summary block to the log and to stdout.
    pub fn summary(&self, summary: &crate::core::models::RunSummary) {
        let block = render_summary(summary);
        println!("{block}");
        self.info(format!(
            "run finished: total={} copied={} skipped={} renamed={} overwritten={} quarantined={} failed={} unclassified={}",
            summary.total,
            summary.copied,
            summary.skipped,
            summary.renamed,
            summary.overwritten,
            summary.quarantined,
            summary.failed,
            summary.unclassified,
        ));
    }

    fn write(&self, entry: LogEntry) {
        let Ok(mut file) = self.file.lock() else {
            return;
        };

        if self.json {
            if let Ok(line) = serde_json::to_string(&entry) {
                let _ = writeln!(file, "{line}");
            }
            return;
        }

        let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S");
        let line = match &entry.error {
            Some(error) => format!(
                "[{timestamp}] {} {} - Error: {error}",
                entry.level, entry.message
            ),
            None => format!("[{timestamp}] {} {}", entry.level, entry.message),
        };
        let _ = writeln!(file, "{line}");
    }
}

fn render_summary(summary: &crate::core::models::RunSummary) -> String {
    let mut out = String::new();
    out.push_str("\n=== sdvault summary ===\n");
    out.push_str(&format!("Total files:    {}\n", summary.total));
    out.push_str(&format!("Copied:         {}\n", summary.copied));
    out.push_str(&format!("Skipped:        {}\n", summary.skipped));
    out.push_str(&format!("Renamed:        {}\n", summary.renamed));
    out.push_str(&format!("Overwritten:    {}\n", summary.overwritten));
    out.push_str(&format!("Quarantined:    {}\n", summary.quarantined));
    out.push_str(&format!("Failed:         {}\n", summary.failed));
    out.push_str(&format!("Unclassified:   {}\n", summary.unclassified));
    out.push_str(&format!("Duration:       {:.1}s\n", summary.duration_secs));
    if summary.bytes_copied > 0 {
        out.push_str(&format!(
            "Bytes copied:   {:.2} MB\n",
            summary.bytes_copied as f64 / 1024.0 / 1024.0
        ));
        out.push_str(&format!(
            "Speed:          {:.2} MB/s\n",
            summary.bytes_per_second / 1024.0 / 1024.0
        ));
    }
    out.push_str("=======================");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::RunSummary;
    use tempfile::tempdir;

    #[test]
    fn text_log_lines_carry_timestamp_and_level() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("logs").join("run.log");

        let log = RunLog::open(&path, false).unwrap();
        log.info("Starting scan: '/media/card'");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("INFO Starting scan: '/media/card'"));
        assert!(contents.starts_with('['));
    }

    #[test]
    fn json_log_lines_parse_back() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("run.log");

        let log = RunLog::open(&path, true).unwrap();
        log.info("hello");

        let contents = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(contents.trim()).unwrap();
        assert_eq!(value["level"], "INFO");
        assert_eq!(value["message"], "hello");
    }

    #[test]
    fn open_appends_across_instances() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("run.log");

        RunLog::open(&path, false).unwrap().info("first");
        RunLog::open(&path, false).unwrap().info("second");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("first"));
        assert!(contents.contains("second"));
    }

    #[test]
    fn summary_block_renders_counters() {
        let mut summary = RunSummary::default();
        summary.total = 4;
        summary.copied = 2;
        summary.failed = 1;
        summary.bytes_copied = 2 * 1024 * 1024;
        summary.duration_secs = 2.0;
        summary.bytes_per_second = summary.bytes_copied as f64 / 2.0;

        let block = render_summary(&summary);
        assert!(block.contains("Total files:    4"));
        assert!(block.contains("Copied:         2"));
        assert!(block.contains("Failed:         1"));
        assert!(block.contains("Bytes copied:   2.00 MB"));
    }
}
