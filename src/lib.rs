//! # outline-split
//!
//! Splits a large PDF into one standalone document per leaf of its bookmark
//! outline, so each section can be processed on its own downstream.
//!
//! # Architecture: A Closed Loop
//!
//! ```text
//! outline ──flatten──▶ descriptors ──plan──▶ tasks ──split──▶ artifacts
//!                                     ▲                          │
//!                                     └────── validate ◀─────────┘
//! ```
//!
//! Every run recomputes the plan from what is actually on disk. Artifacts
//! already present are skipped; corrupt ones are deleted by the validator
//! and therefore reappear in the next plan. Interrupting a run at any point
//! is safe: rerunning finishes the job.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`outline`] | Loads the bookmark tree from an XML or JSON export |
//! | [`naming`] | Turns bookmark titles into filesystem-safe names |
//! | [`flatten`] | Outline → one descriptor per leaf, with its artifact directory |
//! | [`plan`] | Descriptors → page-range tasks, skipping what is already split |
//! | [`source`] | Source document handles and page-range extraction (lopdf) |
//! | [`split`] | Bounded worker pool that writes artifacts atomically |
//! | [`validate`] | Finds and deletes corrupt artifacts |
//! | [`index`] | `partitions.json`: the page ranges behind every artifact |
//! | [`config`] | `outline-split.toml` loading, validation, and merging |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Global Page Order
//!
//! Sibling subtrees of an outline are not guaranteed to be page-contiguous:
//! a "Vol 3" bookmark can come before "Vol 2" in the tree while its pages
//! come after. Section boundaries are therefore computed over all leaves
//! sorted by start page, never within a subtree.
//!
//! ## Whole-or-Absent Artifacts
//!
//! Artifacts are written to a temp file and linked into place. A reader (or
//! the planner) sees either a complete document or nothing. The only way an
//! artifact changes after that is the validator deleting it.

pub mod config;
pub mod flatten;
pub mod index;
pub mod naming;
pub mod outline;
pub mod output;
pub mod plan;
pub mod source;
pub mod split;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_helpers;
