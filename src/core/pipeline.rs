//! The ingest pipeline orchestrator.
//!
//! Drives one run through its phases: scan, plan (metadata, date filter,
//! placement, dedup, conflict), parallel copy, finalize (summary, resume
//! state, history). The pipeline exclusively owns the run's mutable state;
//! progress is reported to at most one registered observer.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local, Utc};
use tracing::{error, info, warn};

use crate::config::IngestConfig;
use crate::core::copier::Copier;
use crate::core::metadata::CaptureExtractor;
use crate::core::models::{CaptureReading, CopyAction, FileRecord, RunStatus, RunSummary, TaskStatus};
use crate::core::planner::Planner;
use crate::core::policy::{ConflictResolver, DedupChecker};
use crate::core::progress::{ProgressEvent, ProgressObserver};
use crate::core::scanner::Scanner;
use crate::history::{default_history_file, HistoryEntry, RunHistory};
use crate::logging::RunLog;
use crate::state::ResumeStore;

/// How often the plan loop reports analysis progress, in records.
const ANALYSIS_PROGRESS_INTERVAL: usize = 100;

pub struct Pipeline {
    cfg: IngestConfig,
    scanner: Scanner,
    extractor: CaptureExtractor,
    planner: Planner,
    dedup: DedupChecker,
    conflict: ConflictResolver,
    copier: Copier,
    state: ResumeStore,
    history: RunHistory,
    log: RunLog,
    observer: Option<ProgressObserver>,
}

impl Pipeline {
    /// Build a pipeline from a validated configuration. Opens the log sink
    /// and loads the resume state; a malformed state file is fatal here.
    pub async fn new(cfg: IngestConfig) -> Result<Self> {
        let log = RunLog::open(&cfg.log_file, cfg.log_json)?;
        let state = ResumeStore::load(&cfg.state_file).await?;
        let history = RunHistory::new(default_history_file(&cfg.state_file));

        let quarantine_dir = cfg.dest.join(&cfg.quarantine_dir);

        Ok(Self {
            scanner: Scanner::new(cfg.include_extensions.iter()),
            extractor: CaptureExtractor::new(),
            planner: Planner::new(
                cfg.dest.clone(),
                &cfg.unclassified_dir,
                cfg.organize_strategy,
                &cfg.event_name,
            ),
            dedup: DedupChecker::new(cfg.dedup_method),
            conflict: ConflictResolver::new(cfg.conflict_policy, quarantine_dir),
            copier: Copier::new(cfg.jobs, cfg.dry_run, cfg.hash_verify),
            state,
            history,
            log,
            observer: None,
            cfg,
        })
    }

    /// Register the (single) progress observer.
    pub fn subscribe(&mut self, observer: ProgressObserver) {
        self.observer = Some(observer);
    }

    /// Drive one run to completion and return its summary.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let start_time = Utc::now();
        let mut summary = RunSummary::begin(start_time);

        self.log
            .info(format!("Starting scan: '{}'", self.cfg.source.display()));
        self.emit(ProgressEvent::Status {
            message: "Scanning source files... (this may take a while)".to_string(),
        });

        let records = match self.scan().await {
            Ok(records) => records,
            Err(e) => {
                summary.failed = 1;
                summary.finish(Utc::now());
                self.log.error("Scan failed", &e);
                self.log.summary(&summary);
                self.append_history(&summary, RunStatus::Failed).await;
                return Err(e);
            }
        };

        info!(files = records.len(), "scan complete");
        self.log.info(format!("Found {} files", records.len()));
        self.emit(ProgressEvent::Status {
            message: "Analyzing metadata and planning...".to_string(),
        });

        summary.scanned = records.len();
        let total_records = records.len();
        let mut tasks = Vec::new();

        for (i, record) in records.into_iter().enumerate() {
            if i % ANALYSIS_PROGRESS_INTERVAL == 0 {
                self.emit(ProgressEvent::AnalysisProgress {
                    message: "Analyzing metadata...".to_string(),
                    current: i,
                    total: total_records,
                });
            }

            if !self.cfg.ignore_state
                && self.state.is_processed(&record.path, record.size).await
            {
                continue;
            }

            let reading = self.extractor.extract(&record);

            if !self.include_by_date(&record, &reading) {
                continue;
            }
            summary.total += 1;

            if reading.capture_time.is_none() {
                summary.unclassified += 1;
            }
            let mut task = self.planner.plan(record, reading);

            if !self.cfg.ignore_state && self.is_duplicate(&task.source, &task.dest_path).await {
                summary.skipped += 1;
                continue;
            }

            let resolution = self.conflict.resolve(&task);
            if resolution.skip {
                summary.skipped += 1;
                continue;
            }
            task.dest_path = resolution.dest_path;
            task.action = resolution.action;
            tasks.push(task);
        }

        self.emit(ProgressEvent::AnalysisProgress {
            message: "Metadata analysis complete".to_string(),
            current: total_records,
            total: total_records,
        });

        if tasks.is_empty() {
            return Ok(self.finalize(summary).await);
        }

        info!(tasks = tasks.len(), jobs = self.cfg.jobs, "starting copy phase");
        let total_tasks = tasks.len();
        let mut results = self.copier.copy_all(tasks);
        let mut processed = 0usize;

        while let Some(result) = results.recv().await {
            processed += 1;
            let task = &result.task;

            self.emit(ProgressEvent::Progress {
                current: processed,
                total: total_tasks,
                filename: task.source.name.clone(),
                action: task.action,
            });

            match task.action {
                CopyAction::Copied => {
                    summary.copied += 1;
                    summary.bytes_copied += task.source.size;
                }
                CopyAction::Renamed => {
                    summary.renamed += 1;
                    summary.bytes_copied += task.source.size;
                }
                CopyAction::Overwritten => {
                    summary.overwritten += 1;
                    summary.bytes_copied += task.source.size;
                }
                CopyAction::Quarantined => {
                    summary.quarantined += 1;
                    summary.bytes_copied += task.source.size;
                }
                CopyAction::Skipped => summary.skipped += 1,
                CopyAction::Failed => summary.failed += 1,
            }

            if task.status != TaskStatus::Failed && !self.cfg.dry_run {
                self.state
                    .mark_processed(&task.source.path, task.source.size, &task.dest_path)
                    .await;
            }
            self.log.task(task);
        }

        Ok(self.finalize(summary).await)
    }

    async fn scan(&self) -> Result<Vec<FileRecord>> {
        let scanner = self.scanner.clone();
        let root = self.cfg.source.clone();
        tokio::task::spawn_blocking(move || scanner.scan(&root))
            .await
            .map_err(|e| anyhow!("scan task failed: {e}"))?
            .context("scan failed")
    }

    /// Dedup verdict for one planned destination; read errors count as "not
    /// a duplicate" so the file still flows through conflict resolution.
    async fn is_duplicate(&self, source: &FileRecord, dest_path: &std::path::Path) -> bool {
        let dedup = self.dedup.clone();
        let source = source.clone();
        let dest: PathBuf = dest_path.to_path_buf();

        let verdict = tokio::task::spawn_blocking(move || dedup.is_duplicate(&source, &dest))
            .await
            .unwrap_or_else(|e| Err(anyhow!("dedup task failed: {e}")));

        match verdict {
            Ok(duplicate) => duplicate,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "dedup check failed, treating as new file");
                false
            }
        }
    }

    /// Inclusive `YYYY-MM-DD` window over capture time, falling back to the
    /// file modification time. Comparison is lexicographic on the ISO date
    /// string, timezone-agnostic.
    fn include_by_date(&self, record: &FileRecord, reading: &CaptureReading) -> bool {
        let start = &self.cfg.date_filter_start;
        let end = &self.cfg.date_filter_end;
        if start.is_empty() && end.is_empty() {
            return true;
        }

        let key = match reading.capture_time {
            Some(t) => t.format("%Y-%m-%d").to_string(),
            None => DateTime::<Local>::from(record.modified)
                .format("%Y-%m-%d")
                .to_string(),
        };

        (start.is_empty() || key.as_str() >= start.as_str())
            && (end.is_empty() || key.as_str() <= end.as_str())
    }

    async fn finalize(&mut self, mut summary: RunSummary) -> RunSummary {
        summary.finish(Utc::now());
        self.log.summary(&summary);

        if !self.cfg.dry_run && !self.cfg.ignore_state {
            if let Err(e) = self.state.save().await {
                error!(error = %format!("{e:#}"), "failed to save resume state");
                self.log.error("Failed to save resume state", &e);
            }
        }

        let status = if summary.failed > 0 {
            RunStatus::Failed
        } else {
            RunStatus::Success
        };
        self.append_history(&summary, status).await;

        self.emit(ProgressEvent::Complete {
            summary: summary.clone(),
        });
        summary
    }

    async fn append_history(&self, summary: &RunSummary, status: RunStatus) {
        let entry = HistoryEntry::new(summary.clone(), self.cfg.clone(), status);
        if let Err(e) = self.history.append(entry).await {
            error!(error = %format!("{e:#}"), "failed to save run history");
            self.log.error("Failed to save run history", &e);
        }
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(observer) = &self.observer {
            observer(event);
        }
    }
}
