//! Outline flattening: bookmark tree → partition descriptors.
//!
//! The outline below the document node has two meaningful levels:
//!
//! ```text
//! Core Specification                 ← document node (root)
//! ├── Vol 1: Architecture            ← group   → directory
//! │   ├── Part A: Overview           ← leaf    → directory + one artifact
//! │   └── Part B: Acronyms
//! │       └── 1 Introduction         ← below leaf level, part of Part B
//! └── Vol 2: Controller              ← group without leaves, skipped
//! ```
//!
//! Each leaf yields one [`PartitionDescriptor`] whose `output_path` is
//! `sanitize(group)/sanitize(leaf)`. Descriptors come out in outline order;
//! sorting by page is the planner's job.

use crate::naming::sanitize_name;
use crate::outline::OutlineNode;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// A leaf-level unit of the outline, not yet bounded by an end page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionDescriptor {
    /// `"<group> - <leaf>"` using the original (unsanitized) names.
    pub label: String,
    /// First page of the section (0-based, inclusive).
    pub start_page: u32,
    /// Directory of the artifact, relative to the output root.
    pub output_path: PathBuf,
}

/// A leaf whose output directory was already claimed by an earlier leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathCollision {
    pub label: String,
    pub start_page: u32,
    /// Label of the earlier leaf that keeps the directory.
    pub kept: String,
    pub path: PathBuf,
}

impl fmt::Display for PathCollision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\" and \"{}\" both map to {}",
            self.kept,
            self.label,
            self.path.display()
        )
    }
}

/// Result of flattening an outline.
#[derive(Debug, Clone, Default)]
pub struct Flattened {
    /// One descriptor per leaf, in outline order.
    pub descriptors: Vec<PartitionDescriptor>,
    /// Leaves left out because their directory is taken.
    pub collisions: Vec<PathCollision>,
}

/// Flatten the outline below `root` into leaf descriptors.
///
/// When two leaves sanitize to the same output path the first one in
/// outline order keeps it and the later one is reported as a
/// [`PathCollision`]. Neither artifact is ever overwritten by the other.
pub fn flatten(root: &OutlineNode) -> Flattened {
    let mut result = Flattened::default();
    // Keyed case-insensitively: `Part a` and `Part A` share a directory on
    // macOS and Windows.
    let mut seen: HashMap<String, String> = HashMap::new();

    for group in &root.children {
        if group.children.is_empty() {
            log::debug!("skipping group without leaves: {}", group.name);
            continue;
        }
        let group_dir = sanitize_name(&group.name);

        for leaf in &group.children {
            let label = format!("{} - {}", group.name, leaf.name);
            let output_path = PathBuf::from(&group_dir).join(sanitize_name(&leaf.name));

            let key = output_path.to_string_lossy().to_lowercase();
            if let Some(kept) = seen.get(&key) {
                let collision = PathCollision {
                    label,
                    start_page: leaf.page,
                    kept: kept.clone(),
                    path: output_path,
                };
                log::warn!("skipping outline entry: {}", collision);
                result.collisions.push(collision);
                continue;
            }
            seen.insert(key, label.clone());

            result.descriptors.push(PartitionDescriptor {
                label,
                start_page: leaf.page,
                output_path,
            });
        }
    }

    result
}
