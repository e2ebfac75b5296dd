//! DOCX document builder backed by `docx-rs`.

use std::fs::File;
use std::path::Path;

use docx_rs::{BreakType, Docx, Paragraph, Run};

use crate::error::{Error, Result};

use super::{DocumentBuilder, DocumentSink};

/// [`DocumentBuilder`] producing plain DOCX files.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxBuilder;

impl DocxBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentBuilder for DocxBuilder {
    fn new_document(&self) -> Box<dyn DocumentSink> {
        Box::new(DocxSink::default())
    }
}

#[derive(Default)]
struct DocxSink {
    paragraphs: Vec<Paragraph>,
}

impl DocumentSink for DocxSink {
    fn add_paragraph(&mut self, text: &str) {
        self.paragraphs
            .push(Paragraph::new().add_run(Run::new().add_text(text)));
    }

    fn add_page_break(&mut self) {
        self.paragraphs
            .push(Paragraph::new().add_run(Run::new().add_break(BreakType::Page)));
    }

    fn save(self: Box<Self>, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let docx = self
            .paragraphs
            .into_iter()
            .fold(Docx::new(), |docx, paragraph| docx.add_paragraph(paragraph));
        docx.build()
            .pack(file)
            .map_err(|e| Error::Write(format!("{}: {}", path.display(), e)))
    }
}
