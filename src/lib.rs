//! sdvault: removable-media photo/video ingest into a date-organized
//! archive.
//!
//! The [`core::pipeline::Pipeline`] drives one run: scan, metadata
//! extraction, placement planning, dedup and conflict policies, parallel
//! atomic copy, resume-state update and run history. Front ends construct a
//! validated [`config::IngestConfig`], subscribe a progress observer, and
//! call [`core::pipeline::Pipeline::run`].

pub mod config;
pub mod core;
pub mod history;
pub mod logging;
pub mod state;

pub use config::{ConfigPreset, IngestConfig, ValidationError};
pub use core::{Pipeline, ProgressEvent, ProgressObserver, RunSummary};
pub use history::{HistoryEntry, RunHistory};
pub use state::ResumeStore;
