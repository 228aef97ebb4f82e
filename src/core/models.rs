//! Core data model shared by every pipeline stage.

use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, FixedOffset, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// One scanned source file. Created by the scanner, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Absolute path to the source file.
    pub path: PathBuf,
    /// Base filename.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Filesystem modification time.
    pub modified: SystemTime,
    /// Lowercase extension without the dot (e.g. "jpg", "mp4").
    pub extension: String,
    /// Whether the extension classifies this as a video file.
    pub is_video: bool,
}

/// Result of capture-time extraction for one file.
///
/// Exactly one of `capture_time` / `error` is populated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureReading {
    /// The shooting/recording instant, if it could be determined.
    pub capture_time: Option<DateTime<FixedOffset>>,
    /// Provenance of the reading, e.g. "EXIF:DateTimeOriginal".
    pub source_tag: String,
    /// Extraction error message when no capture time was found.
    pub error: String,
}

impl CaptureReading {
    pub fn found(capture_time: DateTime<FixedOffset>, source_tag: &str) -> Self {
        Self {
            capture_time: Some(capture_time),
            source_tag: source_tag.to_string(),
            error: String::new(),
        }
    }

    pub fn missing(error: impl Into<String>) -> Self {
        Self {
            capture_time: None,
            source_tag: String::new(),
            error: error.into(),
        }
    }
}

/// Status of a copy task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// Action taken (or planned) for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyAction {
    Copied,
    Skipped,
    Renamed,
    Overwritten,
    Quarantined,
    Failed,
}

impl CopyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyAction::Copied => "copied",
            CopyAction::Skipped => "skipped",
            CopyAction::Renamed => "renamed",
            CopyAction::Overwritten => "overwritten",
            CopyAction::Quarantined => "quarantined",
            CopyAction::Failed => "failed",
        }
    }
}

impl std::fmt::Display for CopyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How filename conflicts at the destination are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    Skip,
    Rename,
    Overwrite,
    Quarantine,
}

/// How destination duplicates are detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum DedupMethod {
    #[serde(rename = "name-size")]
    #[value(name = "name-size")]
    NameSize,
    #[serde(rename = "hash")]
    Hash,
}

/// Destination directory layout strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OrganizeStrategy {
    /// YYYY/MM/DD
    Date,
    /// YYYY/YYMMDD[-EventName]/FileType
    Event,
}

/// Terminal status of a whole run, as recorded in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

/// A planned unit of copy work.
///
/// Emitted by the planner as `Pending`; the resolver adjusts `dest_path` and
/// `action` once; the copier sets the terminal `status` and `action`.
#[derive(Debug, Clone)]
pub struct CopyTask {
    pub source: FileRecord,
    pub reading: CaptureReading,
    /// Destination directory, always inside the destination root.
    pub dest_dir: PathBuf,
    /// Full destination file path.
    pub dest_path: PathBuf,
    pub status: TaskStatus,
    pub action: CopyAction,
    pub error: String,
}

impl CopyTask {
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.action = CopyAction::Failed;
        self.error = error.into();
    }
}

/// Statistics for one completed run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub scanned: usize,
    pub total: usize,
    pub copied: usize,
    pub skipped: usize,
    pub renamed: usize,
    pub overwritten: usize,
    pub quarantined: usize,
    pub failed: usize,
    pub unclassified: usize,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_secs: f64,
    pub bytes_copied: u64,
    pub bytes_per_second: f64,
}

impl RunSummary {
    pub fn begin(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time: Some(start_time),
            ..Self::default()
        }
    }

    /// Stamp the end time and derive duration and throughput.
    pub fn finish(&mut self, end_time: DateTime<Utc>) {
        self.end_time = Some(end_time);
        if let Some(start) = self.start_time {
            self.duration_secs = (end_time - start).num_milliseconds() as f64 / 1000.0;
        }
        self.bytes_per_second = if self.duration_secs > 0.0 {
            self.bytes_copied as f64 / self.duration_secs
        } else {
            0.0
        };
    }
}
