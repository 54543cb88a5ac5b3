//! CLI output formatting for all commands.
//!
//! Output leads with each partition's label and page range. The artifact
//! directory is shown as secondary context on an indented `Path:` line.
//!
//! # Output Format
//!
//! ## Plan
//!
//! ```text
//! Partitions (40 source pages)
//! 001 Vol 1: Architecture - Part A: Overview  pp. 2-8 (7 pages)
//!     Path: Vol 1 - Architecture/Part A - Overview
//!     Status: pending
//!
//! Dropped
//!     Vol 9: Errata - Part Z: Pending (page 41): starts past the last page (40 pages)
//!
//! 6 pending, 0 already split, 1 dropped
//! ```
//!
//! ## Split
//!
//! ```text
//! Splitting 6 partitions on 4 workers
//! [1/6] Vol 1: Architecture - Part A: Overview  7 pages in 12.3ms
//! [2/6] Vol 2: Controller - Part A: Radio  FAILED: cannot read source
//! 5 split (33 pages), 0 skipped, 1 failed (6 total)
//! ```
//!
//! ## Validate
//!
//! ```text
//! Deleted Vol 1 - Architecture/Part B - Acronyms/source.pdf: file is empty (0 bytes)
//! 5 valid, 1 deleted
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::plan::{DropReason, PartitionTask, Plan};
use crate::split::{SplitEvent, SplitSummary, TaskReport, TaskResult};
use crate::validate::ValidationReport;
use std::collections::HashSet;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Page range for a task as 0-based source page indices, end inclusive.
/// These are the numbers `partitions.json` and the outline export use.
///
/// ```text
/// pp. 2-8 (7 pages)
/// p. 39 (1 page)
/// ```
fn page_range(task: &PartitionTask) -> String {
    match task.page_count() {
        1 => format!("p. {} (1 page)", task.start_page),
        n => format!("pp. {}-{} ({} pages)", task.start_page, task.end_page - 1, n),
    }
}

/// Path relative to `root` when possible, for shorter lines.
fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

// ============================================================================
// Plan output
// ============================================================================

/// Format a dry-run listing of every planned range and its status.
pub fn format_plan(plan: &Plan, total_pages: u32) -> Vec<String> {
    let pending: HashSet<&Path> = plan.tasks.iter().map(|t| t.output_path.as_path()).collect();
    let present: HashSet<&Path> = plan
        .dropped
        .iter()
        .filter(|d| d.reason == DropReason::AlreadyPresent)
        .map(|d| d.output_path.as_path())
        .collect();

    let mut lines = vec![format!("Partitions ({} source pages)", total_pages)];
    for (i, task) in plan.ranges.iter().enumerate() {
        let status = if pending.contains(task.output_path.as_path()) {
            "pending"
        } else if present.contains(task.output_path.as_path()) {
            "already split"
        } else {
            "deferred (limit)"
        };
        lines.push(format!(
            "{} {}  {}",
            format_index(i + 1),
            task.label,
            page_range(task)
        ));
        lines.push(format!("{}Path: {}", indent(1), task.output_path.display()));
        lines.push(format!("{}Status: {}", indent(1), status));
    }

    let dropped: Vec<_> = plan
        .dropped
        .iter()
        .filter(|d| d.reason != DropReason::AlreadyPresent)
        .collect();
    if !dropped.is_empty() {
        lines.push(String::new());
        lines.push("Dropped".to_string());
        for d in &dropped {
            lines.push(format!(
                "{}{} (page {}): {}",
                indent(1),
                d.label,
                d.start_page,
                d.reason
            ));
        }
    }

    lines.push(String::new());
    let mut totals = format!(
        "{} pending, {} already split, {} dropped",
        plan.tasks.len(),
        plan.already_present(),
        dropped.len()
    );
    if plan.deferred > 0 {
        totals.push_str(&format!(", {} deferred", plan.deferred));
    }
    lines.push(totals);
    lines
}

/// Print plan listing to stdout.
pub fn print_plan(plan: &Plan, total_pages: u32) {
    for line in format_plan(plan, total_pages) {
        println!("{}", line);
    }
}

// ============================================================================
// Split output
// ============================================================================

fn report_line(report: &TaskReport) -> String {
    let label = &report.task.label;
    match &report.result {
        TaskResult::Completed { pages, duration } => {
            let unit = if *pages == 1 { "page" } else { "pages" };
            format!("{}  {} {} in {:.1?}", label, pages, unit, duration)
        }
        TaskResult::Skipped { reason } => format!("{}  skipped: {}", label, reason),
        TaskResult::Failed { error } => format!("{}  FAILED: {}", label, error),
    }
}

/// Format a single split progress event.
pub fn format_split_event(event: &SplitEvent) -> Vec<String> {
    match event {
        SplitEvent::Started { tasks, workers } => {
            let noun = if *tasks == 1 { "partition" } else { "partitions" };
            vec![format!("Splitting {} {} on {} workers", tasks, noun, workers)]
        }
        SplitEvent::TaskFinished {
            finished,
            total,
            report,
        } => vec![format!("[{}/{}] {}", finished, total, report_line(report))],
    }
}

/// Format the end-of-run summary, repeating every failure so it is not lost
/// in the progress stream.
pub fn format_split_summary(summary: &SplitSummary) -> Vec<String> {
    let mut lines = Vec::new();
    let failures: Vec<_> = summary.failures().collect();
    if !failures.is_empty() {
        lines.push("Failed".to_string());
        for report in failures {
            lines.push(format!(
                "{}{} (pp. {}-{})",
                indent(1),
                report.task.label,
                report.task.start_page,
                report.task.end_page.saturating_sub(1)
            ));
            if let TaskResult::Failed { error } = &report.result {
                lines.push(format!("{}{}", indent(2), error));
            }
        }
    }
    lines.push(format!("{} in {:.1?}", summary, summary.elapsed));
    lines
}

/// Print split summary to stdout.
pub fn print_split_summary(summary: &SplitSummary) {
    for line in format_split_summary(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Validate output
// ============================================================================

/// Format a validation report, one line per deleted or undeletable artifact.
pub fn format_validation(report: &ValidationReport, output_root: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    for rejected in &report.deleted {
        lines.push(format!(
            "Deleted {}: {}",
            display_path(&rejected.path, output_root),
            rejected.reason
        ));
    }
    for rejected in &report.delete_failures {
        lines.push(format!(
            "Could not delete {}: {}",
            display_path(&rejected.path, output_root),
            rejected.reason
        ));
    }
    if report.partials_removed > 0 {
        lines.push(format!(
            "Removed {} interrupted partial file(s)",
            report.partials_removed
        ));
    }
    lines.push(report.to_string());
    lines
}

/// Print validation report to stdout.
pub fn print_validation(report: &ValidationReport, output_root: &Path) {
    for line in format_validation(report, output_root) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Dropped;
    use crate::validate::Rejected;
    use std::path::PathBuf;
    use std::time::Duration;

    fn task(label: &str, start: u32, end: u32) -> PartitionTask {
        PartitionTask {
            label: label.into(),
            start_page: start,
            end_page: end,
            output_path: PathBuf::from(label.replace(':', " -")),
        }
    }

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(100), "100");
    }

    #[test]
    fn page_range_multi_page() {
        assert_eq!(page_range(&task("A", 2, 9)), "pp. 2-8 (7 pages)");
    }

    #[test]
    fn page_range_single_page() {
        assert_eq!(page_range(&task("A", 39, 40)), "p. 39 (1 page)");
    }

    // =========================================================================
    // Plan tests
    // =========================================================================

    #[test]
    fn plan_lists_statuses_and_drops() {
        let a = task("Vol 1 - Part A", 2, 9);
        let b = task("Vol 1 - Part B", 9, 14);
        let c = task("Vol 2 - Part A", 14, 19);
        let plan = Plan {
            ranges: vec![a.clone(), b.clone(), c.clone()],
            tasks: vec![a],
            dropped: vec![
                Dropped {
                    label: b.label.clone(),
                    start_page: 9,
                    output_path: b.output_path.clone(),
                    reason: DropReason::AlreadyPresent,
                },
                Dropped {
                    label: "Vol 9 - Part Z".into(),
                    start_page: 41,
                    output_path: PathBuf::from("Vol 9/Part Z"),
                    reason: DropReason::PastEnd { total_pages: 40 },
                },
            ],
            deferred: 1,
        };

        let lines = format_plan(&plan, 40);

        assert_eq!(lines[0], "Partitions (40 source pages)");
        assert_eq!(lines[1], "001 Vol 1 - Part A  pp. 2-8 (7 pages)");
        assert_eq!(lines[3], "    Status: pending");
        assert_eq!(lines[6], "    Status: already split");
        assert_eq!(lines[9], "    Status: deferred (limit)");
        assert!(lines.contains(&"Dropped".to_string()));
        assert!(
            lines.contains(
                &"    Vol 9 - Part Z (page 41): starts past the last page (40 pages)".to_string()
            )
        );
        assert_eq!(
            lines.last().unwrap(),
            "1 pending, 1 already split, 1 dropped, 1 deferred"
        );
    }

    #[test]
    fn status_follows_path_not_label() {
        // Group "X - Y" with leaf "Z" and group "X" with leaf "Y - Z".
        let mut present = task("X - Y - Z", 0, 5);
        present.output_path = PathBuf::from("X - Y/Z");
        let mut deferred = task("X - Y - Z", 5, 9);
        deferred.output_path = PathBuf::from("X/Y - Z");
        let plan = Plan {
            ranges: vec![present.clone(), deferred],
            tasks: vec![],
            dropped: vec![Dropped {
                label: present.label.clone(),
                start_page: 0,
                output_path: present.output_path.clone(),
                reason: DropReason::AlreadyPresent,
            }],
            deferred: 1,
        };

        let lines = format_plan(&plan, 9);

        assert_eq!(lines[3], "    Status: already split");
        assert_eq!(lines[6], "    Status: deferred (limit)");
    }

    #[test]
    fn collisions_listed_under_dropped() {
        let kept = task("Vol 1 - Unknown", 0, 9);
        let plan = Plan {
            ranges: vec![kept.clone()],
            tasks: vec![kept],
            dropped: vec![Dropped {
                label: "Vol 1 - Unknown".into(),
                start_page: 5,
                output_path: PathBuf::from("Vol 1/Unknown"),
                reason: DropReason::PathCollision {
                    kept: "Vol 1 - Unknown".into(),
                },
            }],
            deferred: 0,
        };

        let lines = format_plan(&plan, 9);

        assert!(lines.contains(
            &"    Vol 1 - Unknown (page 5): output directory already taken by \"Vol 1 - Unknown\""
                .to_string()
        ));
        assert_eq!(lines.last().unwrap(), "1 pending, 0 already split, 1 dropped");
    }

    #[test]
    fn empty_plan_has_totals_only() {
        let lines = format_plan(&Plan::default(), 10);
        assert_eq!(
            lines,
            vec![
                "Partitions (10 source pages)".to_string(),
                String::new(),
                "0 pending, 0 already split, 0 dropped".to_string(),
            ]
        );
    }

    // =========================================================================
    // Split tests
    // =========================================================================

    #[test]
    fn started_event() {
        let lines = format_split_event(&SplitEvent::Started {
            tasks: 6,
            workers: 4,
        });
        assert_eq!(lines, vec!["Splitting 6 partitions on 4 workers"]);
    }

    #[test]
    fn finished_event_completed() {
        let lines = format_split_event(&SplitEvent::TaskFinished {
            finished: 1,
            total: 6,
            report: TaskReport {
                task: task("Vol 1 - Part A", 2, 9),
                result: TaskResult::Completed {
                    pages: 7,
                    duration: Duration::from_millis(12),
                },
            },
        });
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("[1/6] Vol 1 - Part A  7 pages in "));
    }

    #[test]
    fn finished_event_failed() {
        let lines = format_split_event(&SplitEvent::TaskFinished {
            finished: 2,
            total: 6,
            report: TaskReport {
                task: task("Vol 2 - Part A", 14, 19),
                result: TaskResult::Failed {
                    error: "cannot read source".into(),
                },
            },
        });
        assert_eq!(
            lines,
            vec!["[2/6] Vol 2 - Part A  FAILED: cannot read source"]
        );
    }

    #[test]
    fn summary_repeats_failures() {
        let summary = SplitSummary {
            completed: 1,
            failed: 1,
            pages_written: 7,
            reports: vec![
                TaskReport {
                    task: task("A", 2, 9),
                    result: TaskResult::Completed {
                        pages: 7,
                        duration: Duration::ZERO,
                    },
                },
                TaskReport {
                    task: task("B", 9, 14),
                    result: TaskResult::Failed {
                        error: "boom".into(),
                    },
                },
            ],
            ..Default::default()
        };

        let lines = format_split_summary(&summary);

        assert_eq!(lines[0], "Failed");
        assert_eq!(lines[1], "    B (pp. 9-13)");
        assert_eq!(lines[2], "        boom");
        assert!(lines[3].starts_with("1 split (7 pages), 0 skipped, 1 failed (2 total) in "));
    }

    // =========================================================================
    // Validate tests
    // =========================================================================

    #[test]
    fn validation_lines_use_relative_paths() {
        let root = Path::new("/data/kb");
        let report = ValidationReport {
            valid: 5,
            deleted: vec![Rejected {
                path: root.join("Vol 1/Part B/source.pdf"),
                reason: "file is empty (0 bytes)".into(),
            }],
            partials_removed: 2,
            ..Default::default()
        };

        let lines = format_validation(&report, root);

        assert_eq!(
            lines,
            vec![
                "Deleted Vol 1/Part B/source.pdf: file is empty (0 bytes)".to_string(),
                "Removed 2 interrupted partial file(s)".to_string(),
                "5 valid, 1 deleted".to_string(),
            ]
        );
    }
}
