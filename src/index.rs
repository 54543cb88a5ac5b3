//! The partition index written alongside the artifacts.
//!
//! `partitions.json` at the output root records every planned range, whether
//! or not it was split in this run. Downstream consumers read it to map
//! artifact pages back to source pages without re-parsing the outline.
//!
//! The file is rewritten only when its content changes, so repeated runs
//! over a finished tree leave it untouched.

use crate::plan::{PartitionTask, Plan};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Name of the index file within the output root.
pub const INDEX_FILENAME: &str = "partitions.json";

/// Version of the index format.
const INDEX_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionIndex {
    pub version: u32,
    pub total_pages: u32,
    pub artifact_name: String,
    pub partitions: Vec<PartitionTask>,
}

impl PartitionIndex {
    pub fn from_plan(plan: &Plan, total_pages: u32, artifact_name: &str) -> Self {
        Self {
            version: INDEX_VERSION,
            total_pages,
            artifact_name: artifact_name.to_string(),
            partitions: plan.ranges.clone(),
        }
    }

    pub fn path(output_root: &Path) -> PathBuf {
        output_root.join(INDEX_FILENAME)
    }

    /// Load from the output root. `None` if the file is missing, unreadable,
    /// or written by a different format version.
    pub fn load(output_root: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(Self::path(output_root)).ok()?;
        let index: Self = serde_json::from_str(&content).ok()?;
        (index.version == INDEX_VERSION).then_some(index)
    }

    /// Write the index unless an identical one is already on disk.
    ///
    /// Returns whether the file was written. The write goes through a temp
    /// file in the output root so readers never see a half-written index.
    pub fn save_if_changed(&self, output_root: &Path) -> io::Result<bool> {
        if Self::load(output_root).as_ref() == Some(self) {
            return Ok(false);
        }
        std::fs::create_dir_all(output_root)?;
        let json = serde_json::to_string_pretty(self)?;
        let mut tmp = tempfile::Builder::new()
            .prefix(".partitions-")
            .suffix(".tmp")
            .tempfile_in(output_root)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(Self::path(output_root))
            .map_err(|e| e.error)?;
        Ok(true)
    }

    /// Look up the partition whose artifact lives in `output_path`.
    pub fn find(&self, output_path: &Path) -> Option<&PartitionTask> {
        self.partitions.iter().find(|p| p.output_path == output_path)
    }
}
