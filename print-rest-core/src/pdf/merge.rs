use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use super::page_range::PageRange;
use crate::error::PrintError;

/// Keys a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];
const MAX_TREE_DEPTH: usize = 64;

/// Parses PDF bytes. Encrypted documents are refused.
pub fn load_pdf(bytes: &[u8]) -> Result<Document, PrintError> {
    let document = Document::load_mem(bytes)?;
    if document.is_encrypted() {
        return Err(PrintError::bad_request("Encrypted PDF documents cannot be merged"));
    }
    Ok(document)
}

/// Builds one document out of page selections of other documents. Pages are
/// appended in call order; each call imports a fresh copy of its source, so
/// the same source may be appended several times.
pub struct PdfMerger {
    document: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
}

impl Default for PdfMerger {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfMerger {
    pub fn new() -> Self {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        Self {
            document,
            pages_id,
            kids: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Appends the pages of `source` selected by `range` (all pages when
    /// `None`). Returns how many pages were added; a selection that matches
    /// no page is a validation error.
    pub fn append(&mut self, source: &Document, range: Option<&PageRange>) -> Result<usize, PrintError> {
        let mut source = source.clone();
        source.renumber_objects_with(self.document.max_id + 1);

        let page_ids: Vec<ObjectId> = source.get_pages().into_values().collect();
        let selected: Vec<usize> = match range {
            Some(range) => range.indices(page_ids.len()),
            None => (0..page_ids.len()).collect(),
        };
        if selected.is_empty() {
            let shown = range.map(|r| r.to_string()).unwrap_or_else(|| ":".into());
            return Err(PrintError::bad_request(format!(
                "Page range '{shown}' selects no pages of a {}-page document",
                page_ids.len()
            )));
        }

        for &index in &selected {
            inherit_page_attributes(&mut source, page_ids[index])?;
        }

        self.document.max_id = self.document.max_id.max(source.max_id);
        self.document.objects.extend(source.objects);
        for &index in &selected {
            let page_id = page_ids[index];
            if let Ok(Object::Dictionary(page)) = self.document.get_object_mut(page_id) {
                page.set("Parent", Object::Reference(self.pages_id));
            }
            self.kids.push(page_id);
        }
        debug!(added = selected.len(), total = self.kids.len(), "Appended pages");
        Ok(selected.len())
    }

    pub fn append_bytes(&mut self, bytes: &[u8], range: Option<&PageRange>) -> Result<usize, PrintError> {
        let source = load_pdf(bytes)?;
        self.append(&source, range)
    }

    /// Writes the merged document. Objects no page refers to are dropped.
    pub fn finish(mut self) -> Result<Vec<u8>, PrintError> {
        if self.kids.is_empty() {
            return Err(PrintError::bad_request("No pages to merge"));
        }
        let kids: Vec<Object> = self.kids.iter().map(|&id| Object::Reference(id)).collect();
        let pages = Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(self.kids.len() as i64)),
        ]);
        self.document
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.document.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(self.pages_id)),
        ]));
        self.document.trailer.set("Root", Object::Reference(catalog_id));

        self.document.prune_objects();
        self.document.renumber_objects();
        self.document.compress();

        let mut output = Vec::new();
        self.document
            .save_to(&mut output)
            .map_err(|e| PrintError::Pdf(format!("cannot write merged PDF: {e}")))?;
        Ok(output)
    }
}

/// Merges `(document, range)` pairs in order.
pub fn merge_pdfs(sources: &[(&[u8], Option<PageRange>)]) -> Result<Vec<u8>, PrintError> {
    let mut merger = PdfMerger::new();
    for (bytes, range) in sources {
        merger.append_bytes(bytes, range.as_ref())?;
    }
    merger.finish()
}

// Copies inherited attributes onto the page itself so it keeps its look
// once re-parented under the new page tree.
fn inherit_page_attributes(document: &mut Document, page_id: ObjectId) -> Result<(), PrintError> {
    let page = document.get_object(page_id)?.as_dict()?;
    let missing: Vec<&[u8]> = INHERITABLE.iter().copied().filter(|key| !page.has(key)).collect();
    if missing.is_empty() {
        return Ok(());
    }

    let mut inherited: Vec<(&[u8], Object)> = Vec::new();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;
    while let Some(node_id) = parent {
        depth += 1;
        if depth > MAX_TREE_DEPTH {
            break;
        }
        let Ok(node) = document.get_object(node_id).and_then(Object::as_dict) else {
            break;
        };
        for key in &missing {
            if inherited.iter().any(|(k, _)| k == key) {
                continue;
            }
            if let Ok(value) = node.get(key) {
                inherited.push((*key, value.clone()));
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    if let Object::Dictionary(page) = document.get_object_mut(page_id)? {
        for (key, value) in inherited {
            page.set(key.to_vec(), value);
        }
    }
    Ok(())
}
