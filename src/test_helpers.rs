//! Shared test utilities for the outline-split test suite.
//!
//! Provides small synthetic PDFs (one labelled page per index), fixture
//! setup, and lookups over plans and split results.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let outline = load_outline(&tmp.path().join("bookmarks.xml")).unwrap();
//! let source = PdfSource::new(tmp.path().join(FIXTURE_SOURCE));
//!
//! let part = find_task(&plan.tasks, "Vol 2: Controller - Part A: Radio");
//! assert_eq!((part.start_page, part.end_page), (14, 19));
//! ```

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, StringFormat, dictionary};
use std::path::Path;
use tempfile::TempDir;

use crate::plan::PartitionTask;

/// Name of the generated source PDF inside a fixture directory.
pub const FIXTURE_SOURCE: &str = "core.pdf";

/// Page count of the generated fixture source.
pub const FIXTURE_PAGES: u32 = 40;

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/` to a temp directory and add a generated source PDF.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    write_test_pdf(&tmp.path().join(FIXTURE_SOURCE), FIXTURE_PAGES);
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

// =========================================================================
// Synthetic PDFs
// =========================================================================

/// Text drawn on source page `index` (0-based).
pub fn page_label(index: u32) -> String {
    format!("Source page {}", index)
}

/// Build an in-memory PDF with `num_pages` pages, each showing
/// [`page_label`]. `Resources` and `MediaBox` live on the `Pages` node so
/// extraction has to resolve inherited attributes.
pub fn build_test_pdf(num_pages: u32) -> Document {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut page_ids: Vec<Object> = Vec::new();
    for i in 0..num_pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![100.into(), 700.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        page_label(i).into_bytes(),
                        StringFormat::Literal,
                    )],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids,
            "Count" => num_pages as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }
        .into(),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc
}

/// Write a [`build_test_pdf`] document to `path`.
pub fn write_test_pdf(path: &Path, num_pages: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    build_test_pdf(num_pages).save(path).unwrap();
}

/// The text shown on page `index` (0-based) of `doc`.
pub fn page_text(doc: &Document, index: u32) -> String {
    let page_id: ObjectId = *doc
        .get_pages()
        .get(&(index + 1))
        .unwrap_or_else(|| panic!("page {index} not found"));
    let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
    content
        .operations
        .iter()
        .filter(|op| op.operator == "Tj")
        .filter_map(|op| op.operands.first())
        .filter_map(|o| o.as_str().ok())
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .collect()
}

/// Load an artifact and return the text of every page, in order.
pub fn artifact_pages(path: &Path) -> Vec<String> {
    let doc = Document::load(path)
        .unwrap_or_else(|e| panic!("artifact {} failed to load: {e}", path.display()));
    (0..doc.get_pages().len() as u32)
        .map(|i| page_text(&doc, i))
        .collect()
}

// =========================================================================
// Plan lookups (panic with a clear message on miss)
// =========================================================================

/// Find a task by label. Panics if not found.
pub fn find_task<'a>(tasks: &'a [PartitionTask], label: &str) -> &'a PartitionTask {
    tasks.iter().find(|t| t.label == label).unwrap_or_else(|| {
        let labels = task_labels(tasks);
        panic!("task '{label}' not found. Available: {labels:?}")
    })
}

/// All task labels in plan order.
pub fn task_labels(tasks: &[PartitionTask]) -> Vec<&str> {
    tasks.iter().map(|t| t.label.as_str()).collect()
}

/// `(label, start, end)` triples for compact assertions.
pub fn task_ranges(tasks: &[PartitionTask]) -> Vec<(&str, u32, u32)> {
    tasks
        .iter()
        .map(|t| (t.label.as_str(), t.start_page, t.end_page))
        .collect()
}
