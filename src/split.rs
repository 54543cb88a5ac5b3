//! Concurrent execution of partition tasks.
//!
//! Tasks run on a bounded [rayon](https://docs.rs/rayon) pool sized by the
//! caller. The task list is computed once up front; workers drain it in any
//! order and tasks complete in any order.
//!
//! ## Task isolation
//!
//! Every task opens its own source handle through the [`SourceOpener`], so
//! no reader is shared between threads. A failing task (unreadable source,
//! page out of range, unwritable destination, even a panic inside the PDF
//! library) becomes a [`TaskResult::Failed`] and never cancels its siblings.
//! There are no retries: re-running the planner picks up whatever is still
//! missing.
//!
//! ## Atomic artifacts
//!
//! Pages are written to a hidden temp file in the destination directory
//! (`.split-XXXXXX.tmp`) and then linked into place with
//! `persist_noclobber`. The final path therefore either does not exist or
//! holds a complete document, and an artifact that is already there is
//! never overwritten.

use crate::plan::PartitionTask;
use crate::source::{SourceDocument, SourceError, SourceOpener};
use rayon::prelude::*;
use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Prefix of in-flight temp files. The validator removes leftovers.
pub const PARTIAL_PREFIX: &str = ".split-";
/// Suffix of in-flight temp files.
pub const PARTIAL_SUFFIX: &str = ".tmp";

#[derive(Error, Debug)]
pub enum SplitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("Start page {start} is past the end of the source ({page_count} pages)")]
    PageOutOfRange { start: u32, page_count: u32 },
    #[error("Artifact path has no parent directory: {0}")]
    NoParent(PathBuf),
    #[error("Worker panicked: {0}")]
    Panicked(String),
    #[error("Cannot start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Settings for one split run.
#[derive(Debug, Clone)]
pub struct SplitOptions {
    pub output_root: PathBuf,
    /// File name of the artifact inside each leaf directory.
    pub artifact_name: String,
    /// Number of worker threads (at least one).
    pub workers: usize,
}

/// Outcome of one task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskResult {
    Completed { pages: u32, duration: Duration },
    Skipped { reason: String },
    Failed { error: String },
}

/// A task together with its outcome.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub task: PartitionTask,
    pub result: TaskResult,
}

/// Progress events streamed while the pool runs.
#[derive(Debug, Clone)]
pub enum SplitEvent {
    Started { tasks: usize, workers: usize },
    TaskFinished {
        /// Number of tasks finished so far, including this one.
        finished: usize,
        total: usize,
        report: TaskReport,
    },
}

/// Aggregated results of a split run.
#[derive(Debug, Default)]
pub struct SplitSummary {
    pub completed: u32,
    pub skipped: u32,
    pub failed: u32,
    pub pages_written: u64,
    /// Per-task reports, in task-list order.
    pub reports: Vec<TaskReport>,
    pub elapsed: Duration,
}

impl SplitSummary {
    pub fn total(&self) -> u32 {
        self.completed + self.skipped + self.failed
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskReport> {
        self.reports
            .iter()
            .filter(|r| matches!(r.result, TaskResult::Failed { .. }))
    }

    fn record(&mut self, report: TaskReport) {
        match &report.result {
            TaskResult::Completed { pages, .. } => {
                self.completed += 1;
                self.pages_written += u64::from(*pages);
            }
            TaskResult::Skipped { .. } => self.skipped += 1,
            TaskResult::Failed { .. } => self.failed += 1,
        }
        self.reports.push(report);
    }
}

impl fmt::Display for SplitSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} split ({} pages), {} skipped, {} failed ({} total)",
            self.completed,
            self.pages_written,
            self.skipped,
            self.failed,
            self.total()
        )
    }
}

/// Resolve the effective worker count: `requested` capped at the core count.
pub fn effective_workers(requested: Option<usize>) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    requested.map(|n| n.clamp(1, cores)).unwrap_or(cores)
}

/// Execute `tasks` on a pool of `options.workers` threads.
///
/// Only failing to start the pool is an error; per-task failures are
/// reported in the summary.
pub fn split<O: SourceOpener>(
    opener: &O,
    tasks: &[PartitionTask],
    options: &SplitOptions,
    events: Option<Sender<SplitEvent>>,
) -> Result<SplitSummary, SplitError> {
    let started = Instant::now();
    let workers = options.workers.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("split-worker-{i}"))
        .build()?;

    log::info!("splitting {} parts on {} workers", tasks.len(), workers);
    if let Some(tx) = &events {
        tx.send(SplitEvent::Started {
            tasks: tasks.len(),
            workers,
        })
        .ok();
    }

    let finished = AtomicUsize::new(0);
    let total = tasks.len();
    let reports: Vec<TaskReport> = pool.install(|| {
        tasks
            .par_iter()
            // One task per job, so a slow part never holds a batch of others.
            .with_max_len(1)
            .map(|task| {
                let report = TaskReport {
                    task: task.clone(),
                    result: run_task(opener, task, options),
                };
                let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(tx) = &events {
                    tx.send(SplitEvent::TaskFinished {
                        finished: done,
                        total,
                        report: report.clone(),
                    })
                    .ok();
                }
                report
            })
            .collect()
    });

    let mut summary = SplitSummary::default();
    for report in reports {
        summary.record(report);
    }
    summary.elapsed = started.elapsed();
    log::info!("split finished in {:.1?}: {}", summary.elapsed, summary);
    Ok(summary)
}

/// Run one task, converting every error and panic into a [`TaskResult`].
pub fn run_task<O: SourceOpener>(
    opener: &O,
    task: &PartitionTask,
    options: &SplitOptions,
) -> TaskResult {
    let started = Instant::now();
    let artifact = task.artifact_path(&options.output_root, &options.artifact_name);

    if let Some(reason) = existing_artifact(&artifact) {
        log::debug!("skipping \"{}\": {}", task.label, reason);
        return TaskResult::Skipped { reason };
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| write_artifact(opener, task, &artifact)))
        .unwrap_or_else(|payload| Err(SplitError::Panicked(panic_message(payload.as_ref()))));

    match outcome {
        Ok(Written::Pages(pages)) => {
            log::debug!("wrote {} ({} pages)", artifact.display(), pages);
            TaskResult::Completed {
                pages,
                duration: started.elapsed(),
            }
        }
        Ok(Written::AlreadyExists) => TaskResult::Skipped {
            reason: "artifact appeared while splitting".to_string(),
        },
        Err(err) => {
            log::warn!("failed to split \"{}\": {}", task.label, err);
            TaskResult::Failed {
                error: err.to_string(),
            }
        }
    }
}

enum Written {
    Pages(u32),
    AlreadyExists,
}

/// Describe an artifact already on disk, if any.
fn existing_artifact(path: &Path) -> Option<String> {
    let meta = fs::metadata(path).ok()?;
    Some(if meta.len() == 0 {
        "empty artifact on disk (run validate to repair)".to_string()
    } else {
        "artifact already exists".to_string()
    })
}

fn write_artifact<O: SourceOpener>(
    opener: &O,
    task: &PartitionTask,
    artifact: &Path,
) -> Result<Written, SplitError> {
    let doc = opener.open()?;
    let page_count = doc.page_count();
    if task.start_page >= page_count {
        return Err(SplitError::PageOutOfRange {
            start: task.start_page,
            page_count,
        });
    }
    let end_page = task.end_page.min(page_count);
    if end_page < task.end_page {
        log::warn!(
            "source shrank since planning: \"{}\" clamped to [{}, {})",
            task.label,
            task.start_page,
            end_page
        );
    }

    let dir = artifact
        .parent()
        .ok_or_else(|| SplitError::NoParent(artifact.to_path_buf()))?;
    // No-op when another worker created it first.
    fs::create_dir_all(dir)?;

    let mut partial = tempfile::Builder::new()
        .prefix(PARTIAL_PREFIX)
        .suffix(PARTIAL_SUFFIX)
        .tempfile_in(dir)?;
    {
        let mut writer = BufWriter::new(partial.as_file_mut());
        doc.write_range(task.start_page, end_page, &mut writer)?;
        writer.flush()?;
    }
    partial.as_file().sync_all()?;

    match partial.persist_noclobber(artifact) {
        Ok(_) => Ok(Written::Pages(end_page - task.start_page)),
        Err(err) if err.error.kind() == std::io::ErrorKind::AlreadyExists => {
            Ok(Written::AlreadyExists)
        }
        Err(err) => Err(err.error.into()),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
