//! Post-copy verification.

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::core::policy::hash_file;

/// Verifies a completed copy: destination size must match the source, and
/// with `hash_verify` the content digests must match too.
#[derive(Debug, Clone, Copy)]
pub struct Verifier {
    hash_verify: bool,
}

impl Verifier {
    pub fn new(hash_verify: bool) -> Self {
        Self { hash_verify }
    }

    /// Runs after the staging rename, against the final destination path.
    pub fn verify(&self, source: &Path, dest: &Path, expected_size: u64) -> Result<()> {
        let dest_meta = std::fs::metadata(dest)
            .with_context(|| format!("destination file not found: {}", dest.display()))?;

        if dest_meta.len() != expected_size {
            bail!(
                "size mismatch: expected {}, got {}",
                expected_size,
                dest_meta.len()
            );
        }

        if !self.hash_verify {
            return Ok(());
        }

        let source_hash = hash_file(source).context("failed to hash source")?;
        let dest_hash = hash_file(dest).context("failed to hash destination")?;
        if source_hash != dest_hash {
            bail!("hash mismatch: src={source_hash}, dest={dest_hash}");
        }

        Ok(())
    }
}
