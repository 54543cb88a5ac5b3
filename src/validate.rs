//! Artifact validation and repair.
//!
//! Walks the output tree and checks every `.pdf` file:
//!
//! 1. A zero-byte file is corrupt.
//! 2. Otherwise the structural envelope (header, cross-reference table,
//!    trailer) is parsed with lopdf, without decoding page content. The
//!    trailer must lead to a catalog with a page tree.
//!
//! Corrupt artifacts are deleted on the spot. Deletion *is* the repair: the
//! next planning pass sees the artifact as missing and schedules it again.
//!
//! ```text
//! Absent ──split──▶ Present ──validate (corrupt)──▶ Absent ──split──▶ Present
//! ```
//!
//! Leftover temp files from a killed split (`.split-*.tmp`) are removed too.
//! Running the validator is always safe and idempotent: a second pass over a
//! clean tree deletes nothing.

use crate::split::{PARTIAL_PREFIX, PARTIAL_SUFFIX};
use lopdf::{Document, Object};
use std::fmt;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ValidateError {
    #[error("Cannot walk output tree: {0}")]
    Walk(#[from] walkdir::Error),
}

/// A deleted artifact and why it was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of a validation pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    /// Number of artifacts that parsed cleanly.
    pub valid: u32,
    /// Corrupt artifacts that were deleted.
    pub deleted: Vec<Rejected>,
    /// Corrupt artifacts that could not be deleted.
    pub delete_failures: Vec<Rejected>,
    /// Stale temp files from interrupted splits that were removed.
    pub partials_removed: u32,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.deleted.is_empty() && self.delete_failures.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} valid, {} deleted", self.valid, self.deleted.len())?;
        if !self.delete_failures.is_empty() {
            write!(f, ", {} could not be deleted", self.delete_failures.len())?;
        }
        Ok(())
    }
}

/// Validate every PDF under `output_root`, deleting corrupt ones.
///
/// A missing output root yields an empty report.
pub fn validate(output_root: &Path) -> Result<ValidationReport, ValidateError> {
    let mut report = ValidationReport::default();
    if !output_root.exists() {
        return Ok(report);
    }

    for entry in WalkDir::new(output_root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let name = entry.file_name().to_string_lossy();

        if name.starts_with(PARTIAL_PREFIX) && name.ends_with(PARTIAL_SUFFIX) {
            match fs::remove_file(path) {
                Ok(()) => {
                    log::info!("removed stale partial {}", path.display());
                    report.partials_removed += 1;
                }
                Err(err) => log::warn!("cannot remove {}: {}", path.display(), err),
            }
            continue;
        }
        if !is_pdf(path) {
            continue;
        }

        match check_artifact(path) {
            Ok(()) => {
                report.valid += 1;
                if report.valid % 100 == 0 {
                    log::info!("verified {} artifacts...", report.valid);
                }
            }
            Err(reason) => {
                let rejected = Rejected {
                    path: path.to_path_buf(),
                    reason,
                };
                match fs::remove_file(path) {
                    Ok(()) => {
                        log::warn!(
                            "deleted corrupt artifact {}: {}",
                            path.display(),
                            rejected.reason
                        );
                        report.deleted.push(rejected);
                    }
                    Err(err) => {
                        log::error!("cannot delete corrupt {}: {}", path.display(), err);
                        report.delete_failures.push(rejected);
                    }
                }
            }
        }
    }

    Ok(report)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Check one artifact. `Err` carries the reason it is corrupt.
pub fn check_artifact(path: &Path) -> Result<(), String> {
    let len = fs::metadata(path).map_err(|e| e.to_string())?.len();
    if len == 0 {
        return Err("file is empty (0 bytes)".to_string());
    }

    // lopdf can panic on sufficiently mangled input; that is corruption too.
    panic::catch_unwind(AssertUnwindSafe(|| check_structure(path)))
        .unwrap_or_else(|_| Err("parser panicked".to_string()))
}

fn check_structure(path: &Path) -> Result<(), String> {
    let doc = Document::load(path).map_err(|e| e.to_string())?;
    let catalog = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .and_then(|id| doc.get_object(id))
        .and_then(Object::as_dict)
        .map_err(|e| format!("no catalog: {e}"))?;
    catalog
        .get(b"Pages")
        .and_then(Object::as_reference)
        .and_then(|id| doc.get_object(id))
        .and_then(Object::as_dict)
        .map_err(|e| format!("no page tree: {e}"))?;
    Ok(())
}
