//! Outline (bookmark tree) loading.
//!
//! The outline is an external export of the source document's bookmarks. Two
//! formats are accepted, chosen by file extension:
//!
//! ## XML bookmark export (`.xml`)
//!
//! ```text
//! <BOOKMARKS>
//!   <ITEM NAME="Core Specification 6.2" PAGE="0">      ← document node
//!     <ITEM NAME="Vol 1: Architecture" PAGE="0">       ← group
//!       <ITEM NAME="Part A: Overview" PAGE="12"/>      ← leaf
//!       <ITEM NAME="Part B: Acronyms" PAGE="87">
//!         <ITEM NAME="1 Introduction" PAGE="88"/>      ← below leaf level
//!       </ITEM>
//!     </ITEM>
//!   </ITEM>
//! </BOOKMARKS>
//! ```
//!
//! The document node is the first `ITEM` under the XML root (or the root
//! itself when it is an `ITEM`).
//!
//! ## JSON (`.json`)
//!
//! ```json
//! {"name": "Core", "page": 0, "children": [{"name": "Vol 1", "page": 0, "children": []}]}
//! ```
//!
//! ## Tolerance
//!
//! A node with a missing name becomes `"Unknown"`; a missing or unparseable
//! page becomes `0`. Malformed entries never abort the run. Only an outline
//! that cannot be read or parsed at all is an error.

use crate::naming::UNKNOWN_NAME;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutlineError {
    #[error("Cannot read outline {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid XML in outline: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("Invalid JSON in outline: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Outline has no ITEM entries: {0}")]
    NoDocumentNode(PathBuf),
    #[error("Unsupported outline format (expected .xml or .json): {0}")]
    UnsupportedFormat(PathBuf),
}

/// Element name of a bookmark entry in the XML export.
const ITEM_TAG: &str = "ITEM";

/// One node of the bookmark tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineNode {
    /// Display label as it appears in the bookmark panel.
    #[serde(default = "unknown_name", deserialize_with = "lenient_name")]
    pub name: String,
    /// 0-based page anchor into the source document.
    #[serde(default, deserialize_with = "lenient_page")]
    pub page: u32,
    #[serde(default)]
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    pub fn new(name: impl Into<String>, page: u32) -> Self {
        Self {
            name: name.into(),
            page,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<OutlineNode>) -> Self {
        self.children = children;
        self
    }

    /// Total number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(OutlineNode::node_count).sum::<usize>()
    }
}

fn unknown_name() -> String {
    UNKNOWN_NAME.to_string()
}

fn lenient_name<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(d)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => s,
        _ => unknown_name(),
    })
}

fn lenient_page<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(d)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(serde_json::Value::String(s)) => parse_page(&s),
        _ => None,
    }
    .unwrap_or(0))
}

fn parse_page(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok()
}

/// Load an outline file, dispatching on its extension.
pub fn load_outline(path: &Path) -> Result<OutlineNode, OutlineError> {
    let content = std::fs::read_to_string(path).map_err(|source| OutlineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let root = match ext.as_str() {
        "xml" => parse_xml(&content)?
            .ok_or_else(|| OutlineError::NoDocumentNode(path.to_path_buf()))?,
        "json" => parse_json(&content)?,
        _ => return Err(OutlineError::UnsupportedFormat(path.to_path_buf())),
    };
    log::debug!(
        "loaded outline {} ({} nodes)",
        path.display(),
        root.node_count()
    );
    Ok(root)
}

/// Parse an XML bookmark export. Returns `Ok(None)` if it has no `ITEM`.
pub fn parse_xml(content: &str) -> Result<Option<OutlineNode>, OutlineError> {
    let doc = roxmltree::Document::parse(content)?;
    let root = doc.root_element();
    let document_node = if root.has_tag_name(ITEM_TAG) {
        Some(root)
    } else {
        root.children()
            .find(|n| n.is_element() && n.has_tag_name(ITEM_TAG))
    };
    Ok(document_node.map(xml_node))
}

fn xml_node(node: roxmltree::Node<'_, '_>) -> OutlineNode {
    let name = attribute(&node, "NAME")
        .filter(|n| !n.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(unknown_name);
    let page = attribute(&node, "PAGE").and_then(parse_page).unwrap_or(0);
    let children = node
        .children()
        .filter(|n| n.is_element() && n.has_tag_name(ITEM_TAG))
        .map(xml_node)
        .collect();
    OutlineNode {
        name,
        page,
        children,
    }
}

/// Exports differ in attribute case (`NAME` vs `name`); accept both.
fn attribute<'a>(node: &roxmltree::Node<'a, '_>, upper: &str) -> Option<&'a str> {
    node.attribute(upper)
        .or_else(|| node.attribute(upper.to_ascii_lowercase().as_str()))
}

/// Parse a JSON outline whose top-level object is the document node.
pub fn parse_json(content: &str) -> Result<OutlineNode, OutlineError> {
    Ok(serde_json::from_str(content)?)
}
