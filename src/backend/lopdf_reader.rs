//! Page text reader backed by `lopdf`.
//!
//! Image XObject streams are dropped while the file is loaded, so only one
//! of them is in memory at a time. The rest of the object table, fonts and
//! content streams included, stays resident until the reader is dropped.

use std::path::Path;

use lopdf::{Document as LopdfDocument, Object, ObjectId};

use crate::detect::detect_format_from_path;
use crate::error::{Error, Result};

use super::{PagedText, TextReader};

/// [`TextReader`] that extracts one page at a time through `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfTextReader;

impl LopdfTextReader {
    pub fn new() -> Self {
        Self
    }
}

impl TextReader for LopdfTextReader {
    fn open(&self, path: &Path) -> Result<Box<dyn PagedText>> {
        detect_format_from_path(path)?;

        let doc = LopdfDocument::load_filtered(path, skip_images)?;
        if doc.is_encrypted() {
            return Err(Error::Encrypted);
        }

        let pages = doc.get_pages().into_keys().collect();
        Ok(Box::new(LopdfPages { doc, pages }))
    }
}

/// Load filter that discards image streams.
///
/// Top-level objects are kept or dropped by the `Option` alone and the
/// object is read back from `object`; only objects packed in object streams
/// use the returned value, and those are never streams.
fn skip_images(id: ObjectId, object: &mut Object) -> Option<(ObjectId, Object)> {
    match object {
        Object::Stream(stream) => {
            let is_image = stream
                .dict
                .get(b"Subtype")
                .and_then(Object::as_name)
                .map_or(false, |name| name == b"Image");
            if is_image {
                None
            } else {
                Some((id, Object::Null))
            }
        }
        other => Some((id, other.clone())),
    }
}

struct LopdfPages {
    doc: LopdfDocument,
    /// lopdf page numbers (1-based), in document order
    pages: Vec<u32>,
}

impl PagedText for LopdfPages {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn text_of(&mut self, index: u32) -> Result<String> {
        let number = *self
            .pages
            .get(index as usize)
            .ok_or(Error::PageOutOfRange(index, self.page_count()))?;

        self.doc
            .extract_text(&[number])
            .map_err(|e| Error::TextExtract(format!("Page {}: {}", index + 1, e)))
    }
}
