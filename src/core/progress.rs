//! Progress events emitted during a run.
//!
//! The pipeline holds zero or one observer; front ends fan events out
//! further themselves (a WebSocket hub, a console renderer). Events
//! serialize to a single tagged record so subscribers on any transport see
//! `{type: "...", ...}`.

use std::sync::Arc;

use serde::Serialize;

use crate::core::models::{CopyAction, RunSummary};

/// Callback registered with [`crate::core::pipeline::Pipeline::subscribe`].
pub type ProgressObserver = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Coarse phase message.
    Status { message: String },
    /// Plan-loop progress, emitted every 100 records and once at 100%.
    AnalysisProgress {
        message: String,
        current: usize,
        total: usize,
    },
    /// One completed copy task, in completion order.
    Progress {
        current: usize,
        total: usize,
        filename: String,
        action: CopyAction,
    },
    /// Terminal event carrying the run summary.
    Complete { summary: RunSummary },
    /// Emitted by the run initiator when construction or the run itself
    /// fails.
    Error { error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_to_tagged_records() {
        let event = ProgressEvent::AnalysisProgress {
            message: "analyzing".to_string(),
            current: 100,
            total: 250,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "analysis_progress");
        assert_eq!(value["current"], 100);
        assert_eq!(value["total"], 250);

        let event = ProgressEvent::Progress {
            current: 1,
            total: 2,
            filename: "photo.jpg".to_string(),
            action: CopyAction::Renamed,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "progress");
        assert_eq!(value["action"], "renamed");

        let event = ProgressEvent::Error {
            error: "scan failed".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["error"], "scan failed");
    }

    #[test]
    fn complete_event_embeds_summary() {
        let mut summary = RunSummary::default();
        summary.copied = 3;
        let value = serde_json::to_value(ProgressEvent::Complete { summary }).unwrap();
        assert_eq!(value["type"], "complete");
        assert_eq!(value["summary"]["copied"], 3);
    }
}
