pub mod copier;
pub mod metadata;
pub mod models;
pub mod pipeline;
pub mod planner;
pub mod policy;
pub mod progress;
pub mod scanner;
pub mod verifier;

pub use copier::{Copier, CopyResult};
pub use metadata::CaptureExtractor;
pub use models::{
    CaptureReading, ConflictPolicy, CopyAction, CopyTask, DedupMethod, FileRecord,
    OrganizeStrategy, RunStatus, RunSummary, TaskStatus,
};
pub use pipeline::Pipeline;
pub use planner::Planner;
pub use policy::{ConflictResolver, DedupChecker};
pub use progress::{ProgressEvent, ProgressObserver};
pub use scanner::Scanner;
pub use verifier::Verifier;
