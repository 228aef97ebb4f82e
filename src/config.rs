//! Run configuration, validation, and presets.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::models::{ConflictPolicy, DedupMethod, OrganizeStrategy};

/// A configuration option failed validation.
#[derive(Debug, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

/// Validated configuration consumed by the pipeline. Front ends construct
/// one of these (flags, presets, saved settings) and hand it over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub include_extensions: Vec<String>,
    pub jobs: usize,
    pub dedup_method: DedupMethod,
    pub conflict_policy: ConflictPolicy,
    pub organize_strategy: OrganizeStrategy,
    #[serde(default)]
    pub event_name: String,
    pub unclassified_dir: String,
    pub quarantine_dir: String,
    pub state_file: PathBuf,
    pub log_file: PathBuf,
    #[serde(default)]
    pub log_json: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub hash_verify: bool,
    #[serde(default)]
    pub ignore_state: bool,
    #[serde(default)]
    pub date_filter_start: String,
    #[serde(default)]
    pub date_filter_end: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        let state_dir = state_dir();
        Self {
            source: PathBuf::new(),
            dest: PathBuf::new(),
            include_extensions: default_extensions(),
            jobs: num_cpus::get().max(1),
            dedup_method: DedupMethod::NameSize,
            conflict_policy: ConflictPolicy::Skip,
            organize_strategy: OrganizeStrategy::Date,
            event_name: String::new(),
            unclassified_dir: "unclassified".to_string(),
            quarantine_dir: "quarantine".to_string(),
            state_file: state_dir.join("state.json"),
            log_file: state_dir.join("sdvault.log"),
            log_json: false,
            dry_run: false,
            hash_verify: false,
            ignore_state: false,
            date_filter_start: String::new(),
            date_filter_end: String::new(),
        }
    }
}

impl IngestConfig {
    /// Check required options and normalize the optional ones. Must pass
    /// before any I/O happens.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        if self.source.as_os_str().is_empty() {
            return Err(ValidationError {
                field: "source",
                message: "source path is required".to_string(),
            });
        }
        if self.dest.as_os_str().is_empty() {
            return Err(ValidationError {
                field: "dest",
                message: "destination path is required".to_string(),
            });
        }

        if self.jobs < 1 {
            self.jobs = 1;
        }

        let state_dir = state_dir();
        if self.state_file.as_os_str().is_empty() {
            self.state_file = state_dir.join("state.json");
        }
        if self.log_file.as_os_str().is_empty() {
            self.log_file = state_dir.join("sdvault.log");
        }
        if self.unclassified_dir.is_empty() {
            self.unclassified_dir = "unclassified".to_string();
        }
        if self.quarantine_dir.is_empty() {
            self.quarantine_dir = "quarantine".to_string();
        }

        Ok(())
    }
}

/// Extensions ingested when the caller does not narrow the set.
pub fn default_extensions() -> Vec<String> {
    [
        "jpg", "jpeg", "heic", "heif", "png", "raw", "arw", "cr2", "nef", "dng", "mp4", "mov",
        "avi", "mkv", "mxf", "xml",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn state_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sdvault")
}

/// A named, saved configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigPreset {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub source: PathBuf,
    pub dest: PathBuf,
    pub include_extensions: Vec<String>,
    pub jobs: usize,
    pub dedup_method: DedupMethod,
    pub conflict_policy: ConflictPolicy,
    pub organize_strategy: OrganizeStrategy,
    #[serde(default)]
    pub event_name: String,
    pub unclassified_dir: String,
    pub quarantine_dir: String,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub hash_verify: bool,
    #[serde(default)]
    pub ignore_state: bool,
    #[serde(default)]
    pub date_filter_start: String,
    #[serde(default)]
    pub date_filter_end: String,
    pub created_at: DateTime<Utc>,
}

impl ConfigPreset {
    pub fn from_config(config: &IngestConfig, name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            source: config.source.clone(),
            dest: config.dest.clone(),
            include_extensions: config.include_extensions.clone(),
            jobs: config.jobs,
            dedup_method: config.dedup_method,
            conflict_policy: config.conflict_policy,
            organize_strategy: config.organize_strategy,
            event_name: config.event_name.clone(),
            unclassified_dir: config.unclassified_dir.clone(),
            quarantine_dir: config.quarantine_dir.clone(),
            dry_run: config.dry_run,
            hash_verify: config.hash_verify,
            ignore_state: config.ignore_state,
            date_filter_start: config.date_filter_start.clone(),
            date_filter_end: config.date_filter_end.clone(),
            created_at: Utc::now(),
        }
    }

    /// Rehydrate a config; file locations fall back to the defaults since
    /// presets carry no machine-specific paths.
    pub fn into_config(self) -> IngestConfig {
        IngestConfig {
            source: self.source,
            dest: self.dest,
            include_extensions: self.include_extensions,
            jobs: self.jobs,
            dedup_method: self.dedup_method,
            conflict_policy: self.conflict_policy,
            organize_strategy: self.organize_strategy,
            event_name: self.event_name,
            unclassified_dir: self.unclassified_dir,
            quarantine_dir: self.quarantine_dir,
            dry_run: self.dry_run,
            hash_verify: self.hash_verify,
            ignore_state: self.ignore_state,
            date_filter_start: self.date_filter_start,
            date_filter_end: self.date_filter_end,
            ..IngestConfig::default()
        }
    }
}
