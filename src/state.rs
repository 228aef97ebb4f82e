//! Persistent resume state.
//!
//! Records every (source path, size) → destination placement that completed
//! successfully, so later runs over the same media can skip the work without
//! touching the destination. Loaded once per run, consulted throughout the
//! plan loop, flushed at finalize.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Proof of one past successful placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeEntry {
    pub path: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    pub dest_path: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    processed: HashMap<String, ResumeEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_run: Option<DateTime<Utc>>,
}

/// Process-wide resume cache. Clones share the same underlying map; readers
/// hold shared access during the plan loop while `mark_processed` takes the
/// write side.
#[derive(Clone)]
pub struct ResumeStore {
    file: PathBuf,
    inner: Arc<RwLock<StoreData>>,
}

impl ResumeStore {
    /// Load the store from `file`. A missing file is an empty store;
    /// malformed JSON is a fatal error.
    pub async fn load(file: &Path) -> Result<Self> {
        let data = match tokio::fs::read(file).await {
            Ok(bytes) => serde_json::from_slice::<StoreData>(&bytes)
                .with_context(|| format!("malformed resume state file {}", file.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreData::default(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read resume state {}", file.display()))
            }
        };

        Ok(Self {
            file: file.to_path_buf(),
            inner: Arc::new(RwLock::new(data)),
        })
    }

    pub async fn is_processed(&self, path: &Path, size: u64) -> bool {
        let data = self.inner.read().await;
        data.processed
            .get(&key_for(path))
            .map(|entry| entry.size == size)
            .unwrap_or(false)
    }

    pub async fn mark_processed(&self, path: &Path, size: u64, dest_path: &Path) {
        let now = Utc::now();
        let mut data = self.inner.write().await;
        data.processed.insert(
            key_for(path),
            ResumeEntry {
                path: key_for(path),
                size,
                hash: None,
                dest_path: dest_path.to_string_lossy().to_string(),
                timestamp: now,
            },
        );
        data.last_run = Some(now);
    }

    pub async fn processed_count(&self) -> usize {
        self.inner.read().await.processed.len()
    }

    /// Serialize as pretty JSON and write via temp-file + rename so a crash
    /// never leaves a half-written store.
    pub async fn save(&self) -> Result<()> {
        let json = {
            let data = self.inner.read().await;
            serde_json::to_vec_pretty(&*data).context("failed to serialize resume state")?
        };

        if let Some(parent) = self.file.parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("failed to create state directory {}", parent.display())
            })?;
        }

        let tmp = self.file.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.file).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e)
                .with_context(|| format!("failed to replace {}", self.file.display()));
        }
        Ok(())
    }
}

fn key_for(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
