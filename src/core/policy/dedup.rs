//! Destination duplicate detection.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::models::{DedupMethod, FileRecord};

const HASH_BUFFER_SIZE: usize = 128 * 1024;

/// Decides whether the destination already holds an equivalent copy.
#[derive(Debug, Clone)]
pub struct DedupChecker {
    method: DedupMethod,
}

impl DedupChecker {
    pub fn new(method: DedupMethod) -> Self {
        Self { method }
    }

    /// `Ok(false)` when the destination does not exist. Under `name-size`
    /// equivalence is size equality (cheap, false-positive-prone by design);
    /// under `hash` it is content digest equality. Read errors surface as
    /// `Err` and the caller decides (the pipeline treats them as "not a
    /// duplicate").
    pub fn is_duplicate(&self, source: &FileRecord, dest_path: &Path) -> Result<bool> {
        let dest_meta = match std::fs::metadata(dest_path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to stat {}", dest_path.display()))
            }
        };

        if self.method == DedupMethod::NameSize {
            return Ok(source.size == dest_meta.len());
        }

        let source_hash = hash_file(&source.path)?;
        let dest_hash = hash_file(dest_path)?;
        Ok(source_hash == dest_hash)
    }
}

/// Streamed BLAKE3 digest of a whole file, hex-encoded.
pub fn hash_file(path: &Path) -> Result<String> {
    let file =
        File::open(path).with_context(|| format!("failed to open {} for hashing", path.display()))?;
    let mut reader = BufReader::with_capacity(HASH_BUFFER_SIZE, file);
    let mut hasher = blake3::Hasher::new();

    let mut buffer = [0u8; HASH_BUFFER_SIZE];
    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .with_context(|| format!("failed to read {} for hashing", path.display()))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}
