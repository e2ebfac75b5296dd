//! Collaborator interfaces for the conversion strategies.
//!
//! The orchestrator never touches PDF internals or DOCX serialization
//! directly. It talks to three seams:
//!
//! - [`RichConverter`]: full-fidelity conversion (images, tables, fonts)
//! - [`TextReader`]: page-sequential text extraction for the fallback path
//! - [`DocumentBuilder`]: paragraph/page-break document assembly
//!
//! Handles returned by `open`/`new_document` release their resources when
//! dropped, so closing is scope-bound.

mod command;
#[cfg(feature = "fallback")]
mod docx;
#[cfg(feature = "fallback")]
mod lopdf_reader;

pub use command::{CommandConverter, DEFAULT_CONVERTER_PROGRAM};
#[cfg(feature = "fallback")]
pub use docx::DocxBuilder;
#[cfg(feature = "fallback")]
pub use lopdf_reader::LopdfTextReader;

use std::path::Path;

use crate::error::Result;
use crate::model::PageRange;

/// What the rich converter is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderSettings {
    /// Page window to convert
    pub pages: PageRange,
    /// Whether images should be embedded
    pub skip_images: bool,
}

/// Full-fidelity PDF → DOCX converter.
pub trait RichConverter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Open `path` for conversion.
    fn open(&self, path: &Path) -> Result<Box<dyn RichDocument>>;

    /// Whether the converter can run at all in this environment.
    fn is_available(&self) -> bool {
        true
    }
}

/// An opened input document. Dropping it closes the document.
pub trait RichDocument {
    /// Convert into `output`.
    fn render(&mut self, output: &Path, settings: &RenderSettings) -> Result<()>;
}

/// Page-sequential text source for the fallback path.
pub trait TextReader: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn PagedText>>;
}

/// An opened text source; pages are addressed by zero-based index.
pub trait PagedText {
    fn page_count(&self) -> u32;

    fn text_of(&mut self, index: u32) -> Result<String>;
}

/// Factory for output documents.
pub trait DocumentBuilder: Send + Sync {
    fn new_document(&self) -> Box<dyn DocumentSink>;
}

/// A document under construction.
pub trait DocumentSink {
    fn add_paragraph(&mut self, text: &str);

    fn add_page_break(&mut self);

    /// Serialize to `path`, consuming the document.
    fn save(self: Box<Self>, path: &Path) -> Result<()>;
}
