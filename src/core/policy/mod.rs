//! Dedup and conflict policies applied between planning and copying.

mod conflict;
mod dedup;

pub use conflict::{unique_suffix, ConflictResolver, Resolution};
pub use dedup::{hash_file, DedupChecker};
