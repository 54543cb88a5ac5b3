//! Partition planning: descriptors → executable page-range tasks.
//!
//! Planning is a pure function of three inputs:
//!
//! ```text
//! (descriptors, total source pages, output-tree snapshot) → Plan
//! ```
//!
//! Nothing is cached between runs. Every invocation recomputes the plan from
//! what is actually on disk, so a killed run, a deleted artifact, or an
//! artifact removed by the validator is picked up by simply running again.
//!
//! ## Boundaries
//!
//! Sibling subtrees of an outline are not necessarily page-contiguous, so
//! descriptors are first sorted globally by start page (stable: ties keep
//! outline order). A section ends where the next *distinct* start page
//! begins, or at the end of the document.
//!
//! ## Shared start pages
//!
//! When several leaves share a start page, the first one in outline order
//! takes the range and the others are dropped as [`DropReason::DuplicateStart`]:
//!
//! ```text
//! A@0  B@10  C@10   (20 pages)   →   A:[0,10)  B:[10,20)  C dropped
//! ```
//!
//! Pages before the first anchor (front matter) belong to no task.

use crate::flatten::{PartitionDescriptor, PathCollision};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A concrete unit of work: copy pages `[start_page, end_page)` into the
/// artifact under `output_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionTask {
    pub label: String,
    pub start_page: u32,
    /// Exclusive.
    pub end_page: u32,
    /// Directory of the artifact, relative to the output root.
    pub output_path: PathBuf,
}

impl PartitionTask {
    pub fn page_count(&self) -> u32 {
        self.end_page - self.start_page
    }

    /// Map a 0-based page of the artifact back to its page in the source.
    ///
    /// Downstream extractors that report "original page numbers" rely on
    /// this offset: artifact page 0 is source page `start_page`.
    pub fn source_page(&self, artifact_page: u32) -> Option<u32> {
        let page = self.start_page.checked_add(artifact_page)?;
        (page < self.end_page).then_some(page)
    }

    /// Absolute path of the artifact file for this task.
    pub fn artifact_path(&self, output_root: &Path, artifact_name: &str) -> PathBuf {
        output_root.join(&self.output_path).join(artifact_name)
    }
}

/// Why a descriptor did not become a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Anchor points past the end of the source (outline/source mismatch).
    PastEnd { total_pages: u32 },
    /// Another leaf with the same start page came first in outline order.
    DuplicateStart { kept: String },
    /// A previously produced artifact is already on disk.
    AlreadyPresent,
    /// An earlier leaf already claimed the same output directory.
    PathCollision { kept: String },
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::PastEnd { total_pages } => {
                write!(f, "starts past the last page ({} pages)", total_pages)
            }
            DropReason::DuplicateStart { kept } => {
                write!(f, "shares its start page with \"{}\"", kept)
            }
            DropReason::AlreadyPresent => write!(f, "already split"),
            DropReason::PathCollision { kept } => {
                write!(f, "output directory already taken by \"{}\"", kept)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dropped {
    pub label: String,
    pub start_page: u32,
    pub output_path: PathBuf,
    pub reason: DropReason,
}

/// Result of one planning pass.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// Every valid range in page order, whether or not its artifact exists.
    pub ranges: Vec<PartitionTask>,
    /// Ranges whose artifact is missing, in page order.
    pub tasks: Vec<PartitionTask>,
    pub dropped: Vec<Dropped>,
    /// Tasks held back by [`Plan::limit`] for a later run.
    pub deferred: usize,
}

impl Plan {
    /// Number of descriptors skipped because their artifact already exists.
    pub fn already_present(&self) -> usize {
        self.dropped
            .iter()
            .filter(|d| d.reason == DropReason::AlreadyPresent)
            .count()
    }

    /// Record outline entries that flattening left out, so they are reported
    /// alongside the planner's own drops.
    pub fn add_collisions(&mut self, collisions: &[PathCollision]) {
        self.dropped.extend(collisions.iter().map(|c| Dropped {
            label: c.label.clone(),
            start_page: c.start_page,
            output_path: c.path.clone(),
            reason: DropReason::PathCollision {
                kept: c.kept.clone(),
            },
        }));
    }

    /// Keep at most `max` tasks; the rest are picked up by a later run.
    pub fn limit(&mut self, max: usize) {
        if self.tasks.len() > max {
            self.deferred += self.tasks.len() - max;
            self.tasks.truncate(max);
        }
    }
}

/// The set of leaf directories that already hold a non-empty artifact.
///
/// Zero-byte files are treated as absent here; they are corrupt and will be
/// removed by the validator.
#[derive(Debug, Clone, Default)]
pub struct OutputSnapshot {
    present: HashSet<PathBuf>,
}

impl OutputSnapshot {
    /// Walk `output_root` and record every directory holding `artifact_name`.
    ///
    /// A missing output root is an empty snapshot.
    pub fn scan(output_root: &Path, artifact_name: &str) -> Self {
        let present = WalkDir::new(output_root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && e.file_name() == artifact_name)
            .filter(|e| e.metadata().map(|m| m.len() > 0).unwrap_or(false))
            .filter_map(|e| {
                e.path()
                    .parent()
                    .and_then(|dir| dir.strip_prefix(output_root).ok())
                    .map(Path::to_path_buf)
            })
            .collect();
        Self { present }
    }

    /// Build a snapshot from relative leaf directories.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            present: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, output_path: &Path) -> bool {
        self.present.contains(output_path)
    }

    pub fn len(&self) -> usize {
        self.present.len()
    }

    pub fn is_empty(&self) -> bool {
        self.present.is_empty()
    }
}

/// Compute the plan for `descriptors` against a source of `total_pages`.
pub fn plan(
    descriptors: &[PartitionDescriptor],
    total_pages: u32,
    snapshot: &OutputSnapshot,
) -> Plan {
    let mut sorted: Vec<&PartitionDescriptor> = descriptors.iter().collect();
    sorted.sort_by_key(|d| d.start_page);

    let mut result = Plan::default();
    let mut first_at_page: Option<(u32, &str)> = None;

    for (i, desc) in sorted.iter().enumerate() {
        if desc.start_page >= total_pages {
            log::warn!(
                "dropping \"{}\": page {} is past the end of the source ({} pages)",
                desc.label,
                desc.start_page,
                total_pages
            );
            result.dropped.push(Dropped {
                label: desc.label.clone(),
                start_page: desc.start_page,
                output_path: desc.output_path.clone(),
                reason: DropReason::PastEnd { total_pages },
            });
            continue;
        }

        if let Some((page, kept)) = first_at_page
            && page == desc.start_page
        {
            log::warn!(
                "dropping \"{}\": page {} already starts \"{}\"",
                desc.label,
                page,
                kept
            );
            result.dropped.push(Dropped {
                label: desc.label.clone(),
                start_page: desc.start_page,
                output_path: desc.output_path.clone(),
                reason: DropReason::DuplicateStart {
                    kept: kept.to_string(),
                },
            });
            continue;
        }
        first_at_page = Some((desc.start_page, desc.label.as_str()));

        let end_page = sorted[i + 1..]
            .iter()
            .map(|next| next.start_page)
            .find(|&p| p > desc.start_page)
            .unwrap_or(total_pages)
            .min(total_pages);

        let task = PartitionTask {
            label: desc.label.clone(),
            start_page: desc.start_page,
            end_page,
            output_path: desc.output_path.clone(),
        };
        result.ranges.push(task.clone());

        if snapshot.contains(&desc.output_path) {
            log::debug!("\"{}\" already split, skipping", desc.label);
            result.dropped.push(Dropped {
                label: desc.label.clone(),
                start_page: desc.start_page,
                output_path: desc.output_path.clone(),
                reason: DropReason::AlreadyPresent,
            });
        } else {
            result.tasks.push(task);
        }
    }

    result
}
