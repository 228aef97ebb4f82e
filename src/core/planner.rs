//! Destination placement planning.

use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};

use crate::core::models::{
    CaptureReading, CopyAction, CopyTask, FileRecord, OrganizeStrategy, TaskStatus,
};

/// RAW container extensions routed to the RAW folder under the event layout.
const RAW_EXTENSIONS: &[&str] = &[
    "raw", "arw", "cr2", "nef", "dng", "raf", "orf", "rw2", "srw",
];

/// Video extensions (plus sidecar XML, co-located with its clip) routed to
/// the MP4 folder under the event layout.
const VIDEO_KIND_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "mkv", "mxf", "mts", "m2ts", "xml",
];

/// Maps (file, reading) to a destination. Pure; never touches the
/// filesystem.
#[derive(Debug, Clone)]
pub struct Planner {
    dest_root: PathBuf,
    unclassified_dir: String,
    strategy: OrganizeStrategy,
    event_name: String,
}

impl Planner {
    pub fn new(
        dest_root: PathBuf,
        unclassified_dir: &str,
        strategy: OrganizeStrategy,
        event_name: &str,
    ) -> Self {
        Self {
            dest_root,
            unclassified_dir: unclassified_dir.to_string(),
            strategy,
            event_name: event_name.to_string(),
        }
    }

    pub fn plan(&self, source: FileRecord, reading: CaptureReading) -> CopyTask {
        let dest_dir = match reading.capture_time {
            None => self.dest_root.join(&self.unclassified_dir),
            Some(t) => self.dated_dir(t, &source.extension),
        };
        let dest_path = dest_dir.join(&source.name);

        CopyTask {
            source,
            reading,
            dest_dir,
            dest_path,
            status: TaskStatus::Pending,
            action: CopyAction::Copied,
            error: String::new(),
        }
    }

    fn dated_dir(&self, t: DateTime<FixedOffset>, extension: &str) -> PathBuf {
        match self.strategy {
            OrganizeStrategy::Date => self
                .dest_root
                .join(t.format("%Y").to_string())
                .join(t.format("%m").to_string())
                .join(t.format("%d").to_string()),
            OrganizeStrategy::Event => {
                let folder = if self.event_name.is_empty() {
                    t.format("%y%m%d").to_string()
                } else {
                    format!("{}-{}", t.format("%y%m%d"), self.event_name)
                };
                self.dest_root
                    .join(t.format("%Y").to_string())
                    .join(folder)
                    .join(file_kind_folder(extension))
            }
        }
    }
}

fn file_kind_folder(extension: &str) -> &'static str {
    if RAW_EXTENSIONS.contains(&extension) {
        "RAW"
    } else if VIDEO_KIND_EXTENSIONS.contains(&extension) {
        "MP4"
    } else {
        "JPG"
    }
}
