//! Bounded run history.
//!
//! Every run appends one entry (summary + config snapshot + status) to a
//! JSON file holding the newest 100 entries, newest first. History is an
//! audit trail: persistence errors are reported to the caller but must never
//! fail the run that produced them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::IngestConfig;
use crate::core::models::{RunStatus, RunSummary};

/// Maximum retained entries.
const HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// UnixNano start timestamp rendered as a decimal string.
    pub id: String,
    pub summary: RunSummary,
    pub config: IngestConfig,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(summary: RunSummary, config: IngestConfig, status: RunStatus) -> Self {
        let created_at = summary.start_time.unwrap_or_else(Utc::now);
        Self {
            id: created_at
                .timestamp_nanos_opt()
                .unwrap_or_default()
                .to_string(),
            summary,
            config,
            status,
            created_at,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryData {
    entries: Vec<HistoryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

/// Append-only view over the history file.
#[derive(Debug, Clone)]
pub struct RunHistory {
    file: PathBuf,
}

impl RunHistory {
    pub fn new(file: PathBuf) -> Self {
        Self { file }
    }

    pub async fn entries(&self) -> Result<Vec<HistoryEntry>> {
        Ok(self.load().await?.entries)
    }

    /// Prepend `entry`, truncate to the newest 100, persist atomically.
    pub async fn append(&self, entry: HistoryEntry) -> Result<()> {
        let mut data = self.load().await?;
        data.entries.insert(0, entry);
        data.entries.truncate(HISTORY_LIMIT);
        data.updated_at = Some(Utc::now());
        self.save(&data).await
    }

    async fn load(&self) -> Result<HistoryData> {
        match tokio::fs::read(&self.file).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("malformed history file {}", self.file.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HistoryData::default()),
            Err(e) => {
                Err(e).with_context(|| format!("failed to read history {}", self.file.display()))
            }
        }
    }

    async fn save(&self, data: &HistoryData) -> Result<()> {
        if let Some(parent) = self.file.parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("failed to create history directory {}", parent.display())
            })?;
        }

        let json = serde_json::to_vec_pretty(data).context("failed to serialize history")?;
        let tmp = self.file.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.file).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e).with_context(|| format!("failed to replace {}", self.file.display()));
        }
        Ok(())
    }
}

/// Default history location next to the other state files.
pub fn default_history_file(state_file: &Path) -> PathBuf {
    state_file
        .parent()
        .map(|dir| dir.join("history.json"))
        .unwrap_or_else(|| PathBuf::from("history.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn entry_at(nanos: i64, status: RunStatus) -> HistoryEntry {
        let start = Utc.timestamp_nanos(nanos);
        let summary = RunSummary::begin(start);
        HistoryEntry::new(summary, IngestConfig::default(), status)
    }

    #[tokio::test]
    async fn id_is_unix_nano_decimal_string() {
        let entry = entry_at(1_735_689_600_123_456_789, RunStatus::Success);
        assert_eq!(entry.id, "1735689600123456789");
    }

    #[tokio::test]
    async fn entries_are_newest_first() {
        let temp = tempdir().unwrap();
        let history = RunHistory::new(temp.path().join("history.json"));

        history.append(entry_at(1_000, RunStatus::Success)).await.unwrap();
        history.append(entry_at(2_000, RunStatus::Failed)).await.unwrap();
        history.append(entry_at(3_000, RunStatus::Success)).await.unwrap();

        let entries = history.entries().await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].id, "3000");
        assert_eq!(entries[1].id, "2000");
        assert_eq!(entries[2].id, "1000");
        assert_eq!(entries[1].status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn history_is_capped_at_one_hundred() {
        let temp = tempdir().unwrap();
        let history = RunHistory::new(temp.path().join("history.json"));

        for i in 0..105 {
            history
                .append(entry_at(i as i64 + 1, RunStatus::Success))
                .await
                .unwrap();
        }

        let entries = history.entries().await.unwrap();
        assert_eq!(entries.len(), 100);
        assert_eq!(entries[0].id, "105");
        assert_eq!(entries[99].id, "6");
    }

    #[tokio::test]
    async fn round_trip_preserves_fields() {
        let temp = tempdir().unwrap();
        let history = RunHistory::new(temp.path().join("history.json"));

        let mut summary = RunSummary::begin(Utc.timestamp_nanos(42_000_000));
        summary.copied = 3;
        summary.total = 4;
        summary.skipped = 1;
        let mut config = IngestConfig::default();
        config.event_name = "wedding".to_string();
        history
            .append(HistoryEntry::new(summary, config, RunStatus::Success))
            .await
            .unwrap();

        let entries = history.entries().await.unwrap();
        assert_eq!(entries[0].summary.copied, 3);
        assert_eq!(entries[0].summary.total, 4);
        assert_eq!(entries[0].config.event_name, "wedding");
        assert_eq!(entries[0].status, RunStatus::Success);
    }

    #[tokio::test]
    async fn save_leaves_no_temp_file() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("history.json");
        let history = RunHistory::new(file.clone());

        history.append(entry_at(7, RunStatus::Success)).await.unwrap();
        assert!(file.exists());
        assert!(!file.with_extension("json.tmp").exists());
    }
}
