//! Source document access and page-range extraction.
//!
//! The source is modelled as a capability factory: a [`SourceOpener`] hands
//! out independent [`SourceDocument`] handles, one per worker. No handle is
//! ever shared between threads, so reads need no locking and the reader
//! implementation does not have to be thread-safe.
//!
//! The production implementation is [`PdfSource`], backed by lopdf.
//!
//! ## Extraction
//!
//! A page range is copied into a fresh document rather than deleting the
//! other pages from a clone of the source. Each selected page is deep-copied
//! together with everything it references (content streams, fonts, images,
//! annotations). Two things need care:
//!
//! - **Inherited attributes**: `Resources`, `MediaBox`, `CropBox` and
//!   `Rotate` may live on an ancestor `Pages` node. They are resolved onto
//!   the page before copying, because the page tree itself is not copied.
//! - **Foreign pages**: links and annotations can reference pages outside
//!   the range. Copying those would drag the whole source along through
//!   their `Parent` chain, so references to page-tree nodes that are not
//!   part of the range become `null`.

use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Cannot open source document {path}: {source}")]
    Open {
        path: PathBuf,
        source: lopdf::Error,
    },
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Pages [{start}, {end}) out of range (document has {page_count} pages)")]
    PageOutOfRange {
        start: u32,
        end: u32,
        page_count: u32,
    },
}

/// An open handle to the source document.
pub trait SourceDocument {
    /// Number of pages in the document.
    fn page_count(&self) -> u32;

    /// Write pages `[start, end)` as a standalone document to `out`.
    fn write_range(&self, start: u32, end: u32, out: &mut dyn Write) -> Result<(), SourceError>;
}

/// Factory for independent source handles.
///
/// `Sync` so a single opener can be shared by every worker in the pool; each
/// worker calls [`open`](SourceOpener::open) for its own handle.
pub trait SourceOpener: Sync {
    type Document: SourceDocument;

    fn open(&self) -> Result<Self::Document, SourceError>;
}

/// A PDF on disk.
#[derive(Debug, Clone)]
pub struct PdfSource {
    path: PathBuf,
}

impl PdfSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SourceOpener for PdfSource {
    type Document = PdfDocument;

    fn open(&self) -> Result<PdfDocument, SourceError> {
        let doc = Document::load(&self.path).map_err(|source| SourceError::Open {
            path: self.path.clone(),
            source,
        })?;
        Ok(PdfDocument::new(doc))
    }
}

/// A parsed PDF with its page list resolved once.
pub struct PdfDocument {
    doc: Document,
    pages: Vec<ObjectId>,
}

impl PdfDocument {
    pub fn new(doc: Document) -> Self {
        // get_pages is keyed by 1-based page number, so values are in order.
        let pages = doc.get_pages().into_values().collect();
        Self { doc, pages }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }
}

impl SourceDocument for PdfDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn write_range(&self, start: u32, end: u32, out: &mut dyn Write) -> Result<(), SourceError> {
        let mut extracted = extract_pages(&self.doc, &self.pages, start, end)?;
        let mut writer = out;
        extracted.save_to(&mut writer)?;
        Ok(())
    }
}

/// Attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_KEYS: &[&[u8]] = &[b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Page trees deeper than this are treated as cyclic.
const MAX_TREE_DEPTH: usize = 64;

/// Copy pages `[start, end)` of `source` into a new standalone document.
///
/// `pages` is the source's page list in reading order.
pub fn extract_pages(
    source: &Document,
    pages: &[ObjectId],
    start: u32,
    end: u32,
) -> Result<Document, SourceError> {
    let page_count = pages.len() as u32;
    if start >= end || end > page_count {
        return Err(SourceError::PageOutOfRange {
            start,
            end,
            page_count,
        });
    }
    let selected = &pages[start as usize..end as usize];

    let mut target = Document::with_version(source.version.clone());
    let pages_id = target.new_object_id();

    let mut copier = ObjectCopier::new(source, &mut target);
    // Reserve ids for every selected page up front so links between pages in
    // the range resolve to the copies.
    let new_ids: Vec<ObjectId> = selected.iter().map(|&id| copier.reserve(id)).collect();

    for (&source_id, &target_id) in selected.iter().zip(&new_ids) {
        let mut page = resolved_page_dict(source, source_id)?;
        page.remove(b"Parent");
        let mut page = copier.remap_dictionary(page)?;
        page.set("Parent", Object::Reference(pages_id));
        copier.replace(target_id, Object::Dictionary(page));
    }

    let kids: Vec<Object> = new_ids.iter().map(|&id| Object::Reference(id)).collect();
    target.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => new_ids.len() as i64,
        }),
    );
    let catalog_id = target.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    target.trailer.set("Root", catalog_id);

    Ok(target)
}

/// A page's own dictionary with inherited attributes filled in.
fn resolved_page_dict(doc: &Document, page_id: ObjectId) -> Result<Dictionary, SourceError> {
    let mut page = doc.get_object(page_id)?.as_dict()?.clone();

    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;
    while let Some(parent_id) = parent {
        depth += 1;
        if depth > MAX_TREE_DEPTH {
            break;
        }
        let Ok(node) = doc.get_object(parent_id).and_then(Object::as_dict) else {
            break;
        };
        for &key in INHERITABLE_KEYS {
            if !page.has(key)
                && let Ok(value) = node.get(key)
            {
                page.set(key.to_vec(), value.clone());
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    Ok(page)
}

fn is_page_tree_node(obj: &Object) -> bool {
    let dict = match obj {
        Object::Dictionary(dict) => dict,
        _ => return false,
    };
    matches!(
        dict.get(b"Type").and_then(Object::as_name),
        Ok(b"Page") | Ok(b"Pages")
    )
}

/// Deep-copies objects from one document into another, remapping ids.
struct ObjectCopier<'a> {
    source: &'a Document,
    target: &'a mut Document,
    id_map: HashMap<ObjectId, ObjectId>,
}

impl<'a> ObjectCopier<'a> {
    fn new(source: &'a Document, target: &'a mut Document) -> Self {
        Self {
            source,
            target,
            id_map: HashMap::new(),
        }
    }

    /// Allocate a placeholder in the target for `source_id`.
    fn reserve(&mut self, source_id: ObjectId) -> ObjectId {
        let new_id = self.target.add_object(Object::Null);
        self.id_map.insert(source_id, new_id);
        new_id
    }

    fn replace(&mut self, target_id: ObjectId, obj: Object) {
        self.target.objects.insert(target_id, obj);
    }

    /// Copy `source_id` and everything it references, once.
    ///
    /// The placeholder is registered before recursing so reference cycles
    /// (annotation → page → annotation) terminate.
    fn copy_object(&mut self, source_id: ObjectId) -> Result<Object, lopdf::Error> {
        if let Some(&target_id) = self.id_map.get(&source_id) {
            return Ok(Object::Reference(target_id));
        }
        let source = self.source;
        let obj = source.get_object(source_id)?;
        if is_page_tree_node(obj) {
            return Ok(Object::Null);
        }
        let obj = obj.clone();

        let target_id = self.reserve(source_id);
        let remapped = self.remap(obj)?;
        self.replace(target_id, remapped);
        Ok(Object::Reference(target_id))
    }

    fn remap(&mut self, obj: Object) -> Result<Object, lopdf::Error> {
        match obj {
            Object::Reference(id) => match self.copy_object(id) {
                Ok(obj) => Ok(obj),
                // Dangling references are legal PDF and read as null.
                Err(lopdf::Error::ObjectNotFound(_)) => Ok(Object::Null),
                Err(err) => Err(err),
            },
            Object::Array(items) => Ok(Object::Array(
                items
                    .into_iter()
                    .map(|o| self.remap(o))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Object::Dictionary(dict) => Ok(Object::Dictionary(self.remap_dictionary(dict)?)),
            Object::Stream(mut stream) => {
                stream.dict = self.remap_dictionary(stream.dict)?;
                Ok(Object::Stream(stream))
            }
            other => Ok(other),
        }
    }

    fn remap_dictionary(&mut self, mut dict: Dictionary) -> Result<Dictionary, lopdf::Error> {
        for (_, value) in dict.iter_mut() {
            let taken = std::mem::replace(value, Object::Null);
            *value = self.remap(taken)?;
        }
        Ok(dict)
    }
}
