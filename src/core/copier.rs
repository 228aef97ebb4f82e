//! Parallel atomic copy execution.
//!
//! A fixed pool of workers drains the task queue. Each copy streams into a
//! `.part` staging file and renames it into place, so an outside observer
//! sees either nothing, a staging file, or a complete destination file,
//! never a partial one. Failed tasks clean their staging file up.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use filetime::FileTime;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::core::models::{CopyAction, CopyTask, TaskStatus};
use crate::core::verifier::Verifier;

/// Buffer size for file streaming.
const BUFFER_SIZE: usize = 128 * 1024;

/// Suffix of the staging file written next to the destination.
const STAGING_SUFFIX: &str = ".part";

/// Outcome of one task; the terminal status and action live on the task.
#[derive(Debug)]
pub struct CopyResult {
    pub task: CopyTask,
}

/// Fixed-width worker pool executing copy tasks.
#[derive(Debug, Clone)]
pub struct Copier {
    workers: usize,
    dry_run: bool,
    hash_verify: bool,
}

impl Copier {
    pub fn new(workers: usize, dry_run: bool, hash_verify: bool) -> Self {
        Self {
            workers: workers.max(1),
            dry_run,
            hash_verify,
        }
    }

    /// Execute all tasks with at most `workers` concurrent copies. Results
    /// arrive on the returned channel in completion order; the channel
    /// closes once every task has reported.
    pub fn copy_all(&self, tasks: Vec<CopyTask>) -> mpsc::Receiver<CopyResult> {
        let capacity = tasks.len().max(1);
        let (task_tx, task_rx) = mpsc::channel::<CopyTask>(capacity);
        let (result_tx, result_rx) = mpsc::channel::<CopyResult>(capacity);
        let task_rx = Arc::new(Mutex::new(task_rx));

        for _ in 0..self.workers {
            let task_rx = Arc::clone(&task_rx);
            let result_tx = result_tx.clone();
            let dry_run = self.dry_run;
            let hash_verify = self.hash_verify;

            tokio::spawn(async move {
                loop {
                    let task = { task_rx.lock().await.recv().await };
                    let Some(task) = task else { break };

                    let fallback = task.clone();
                    let result = tokio::task::spawn_blocking(move || {
                        copy_one(task, dry_run, hash_verify)
                    })
                    .await
                    .unwrap_or_else(|e| {
                        let mut task = fallback;
                        task.fail(format!("copy worker panicked: {e}"));
                        CopyResult { task }
                    });

                    if result_tx.send(result).await.is_err() {
                        break;
                    }
                }
            });
        }

        // Queue capacity covers the whole slice, so feeding it never blocks
        // on the workers.
        tokio::spawn(async move {
            for task in tasks {
                if task_tx.send(task).await.is_err() {
                    break;
                }
            }
        });

        result_rx
    }
}

/// Execute one task to its terminal state. Runs on a blocking thread.
fn copy_one(mut task: CopyTask, dry_run: bool, hash_verify: bool) -> CopyResult {
    task.status = TaskStatus::Running;

    if dry_run {
        task.status = TaskStatus::Completed;
        task.action = CopyAction::Copied;
        return CopyResult { task };
    }

    if let Some(parent) = task.dest_path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            task.fail(format!("failed to create {}: {e}", parent.display()));
            return CopyResult { task };
        }
    }

    let staging = staging_path(&task.dest_path);
    debug!(
        source = %task.source.path.display(),
        dest = %task.dest_path.display(),
        "copying file"
    );

    if let Err(e) = stage_copy(&task, &staging) {
        let _ = fs::remove_file(&staging);
        task.fail(e);
        return CopyResult { task };
    }

    // Best-effort: carry the source mtime onto the staged file so the
    // destination keeps it across the rename.
    let mtime = FileTime::from_system_time(task.source.modified);
    let _ = filetime::set_file_times(&staging, mtime, mtime);

    if let Err(e) = fs::rename(&staging, &task.dest_path) {
        let _ = fs::remove_file(&staging);
        task.fail(format!("failed to finalize copy: {e}"));
        return CopyResult { task };
    }

    if hash_verify {
        if let Err(e) = Verifier::new(true).verify(
            &task.source.path,
            &task.dest_path,
            task.source.size,
        ) {
            let _ = fs::remove_file(&task.dest_path);
            task.fail(format!("verification failed: {e:#}"));
            return CopyResult { task };
        }
    }

    task.status = TaskStatus::Completed;
    CopyResult { task }
}

/// Stream the source into the staging file.
fn stage_copy(task: &CopyTask, staging: &PathBuf) -> Result<(), String> {
    let source = File::open(&task.source.path)
        .map_err(|e| format!("failed to open source: {e}"))?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, source);

    let dest = File::create(staging)
        .map_err(|e| format!("failed to create staging file: {e}"))?;
    let mut writer = BufWriter::with_capacity(BUFFER_SIZE, dest);

    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| format!("failed to read source: {e}"))?;
        if bytes_read == 0 {
            break;
        }
        writer
            .write_all(&buffer[..bytes_read])
            .map_err(|e| format!("failed to write staging file: {e}"))?;
    }

    writer
        .flush()
        .map_err(|e| format!("failed to flush staging file: {e}"))?;
    Ok(())
}

fn staging_path(dest: &std::path::Path) -> PathBuf {
    let mut staged = dest.as_os_str().to_owned();
    staged.push(STAGING_SUFFIX);
    PathBuf::from(staged)
}
