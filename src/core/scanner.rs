//! Source tree enumeration.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

use anyhow::{Context, Result};
use tracing::warn;
use walkdir::WalkDir;

use crate::core::models::FileRecord;

/// Extensions classified as video. Orthogonal to whether the extractor later
/// looks for a sidecar XML.
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "mkv", "mxf", "m4v", "webm", "wmv", "flv",
];

/// Walks a source root and yields one [`FileRecord`] per regular file whose
/// extension is in the include set.
#[derive(Debug, Clone)]
pub struct Scanner {
    include: HashSet<String>,
}

impl Scanner {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let include = extensions
            .into_iter()
            .map(|e| e.as_ref().to_lowercase())
            .collect();
        Self { include }
    }

    /// Enumerate the tree under `root` in the filesystem's order.
    ///
    /// Symlinks are followed only when the target is a regular file. An
    /// unreadable subtree aborts the scan with an error; an unreadable single
    /// file is skipped with a warning.
    pub fn scan(&self, root: &Path) -> Result<Vec<FileRecord>> {
        let mut records = Vec::new();

        for entry in WalkDir::new(root) {
            let entry = entry
                .with_context(|| format!("failed to scan source tree under {}", root.display()))?;

            if entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path();
            let Some(extension) = lowercase_extension(path) else {
                continue;
            };
            if !self.include.contains(&extension) {
                continue;
            }

            // Symlinks: include only when the target is a regular file.
            let metadata = if entry.file_type().is_symlink() {
                match fs::metadata(path) {
                    Ok(m) if m.is_file() => m,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping dangling symlink");
                        continue;
                    }
                }
            } else {
                match entry.metadata() {
                    Ok(m) => m,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping unreadable file");
                        continue;
                    }
                }
            };

            let name = entry.file_name().to_string_lossy().to_string();
            records.push(FileRecord {
                path: path.to_path_buf(),
                name,
                size: metadata.len(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                is_video: VIDEO_EXTENSIONS.contains(&extension.as_str()),
                extension,
            });
        }

        Ok(records)
    }
}

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}
