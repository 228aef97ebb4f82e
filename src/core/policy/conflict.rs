//! Conflict resolution for occupied destination paths.

use std::path::{Path, PathBuf};

use crate::core::models::{ConflictPolicy, CopyAction, CopyTask};

/// Upper bound on `_N` suffix probing.
const MAX_RENAME_PROBES: u32 = 9999;

/// The resolver's decision for one task.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub action: CopyAction,
    pub dest_path: PathBuf,
    pub skip: bool,
}

/// Decides what happens when a non-equivalent file already occupies the
/// planned destination path.
#[derive(Debug, Clone)]
pub struct ConflictResolver {
    policy: ConflictPolicy,
    quarantine_dir: PathBuf,
}

impl ConflictResolver {
    pub fn new(policy: ConflictPolicy, quarantine_dir: PathBuf) -> Self {
        Self {
            policy,
            quarantine_dir,
        }
    }

    /// Dedup has already ruled the occupant non-equivalent by the time this
    /// runs; a free destination passes through unchanged.
    pub fn resolve(&self, task: &CopyTask) -> Resolution {
        if !task.dest_path.exists() {
            return Resolution {
                action: CopyAction::Copied,
                dest_path: task.dest_path.clone(),
                skip: false,
            };
        }

        match self.policy {
            ConflictPolicy::Skip => Resolution {
                action: CopyAction::Skipped,
                dest_path: task.dest_path.clone(),
                skip: true,
            },
            ConflictPolicy::Overwrite => Resolution {
                action: CopyAction::Overwritten,
                dest_path: task.dest_path.clone(),
                skip: false,
            },
            ConflictPolicy::Rename => Resolution {
                action: CopyAction::Renamed,
                dest_path: unique_suffix(&task.dest_path),
                skip: false,
            },
            ConflictPolicy::Quarantine => Resolution {
                action: CopyAction::Quarantined,
                dest_path: unique_suffix(&self.quarantine_dir.join(&task.source.name)),
                skip: false,
            },
        }
    }
}

/// First free `base_N.ext` path for N in 1..=9999; the input path comes back
/// unchanged when every probe is occupied.
pub fn unique_suffix(path: &Path) -> PathBuf {
    probe_unique(path, MAX_RENAME_PROBES)
}

fn probe_unique(path: &Path, max_probes: u32) -> PathBuf {
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    for i in 1..=max_probes {
        let candidate = dir.join(format!("{stem}_{i}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
    }

    path.to_path_buf()
}
