//! Text-only fallback conversion.
//!
//! Reads the source one page at a time and writes a plain document with
//! one paragraph per line of text. Images, tables and styling are lost;
//! peak memory stays proportional to a single page.

use std::fs;
use std::sync::Arc;
use std::time::Instant;

use crate::backend::{DocumentBuilder, TextReader};
use crate::budget::MemoryBudget;
use crate::error::{Error, Result};
use crate::model::{ConversionRequest, ConvertedDocument};
use crate::monitor::{Checkpoint, MemoryMonitor};

/// Page-sequential text extraction into a fresh document.
#[derive(Clone)]
pub struct TextOnlyConverter {
    reader: Option<Arc<dyn TextReader>>,
    builder: Option<Arc<dyn DocumentBuilder>>,
}

impl TextOnlyConverter {
    /// Use the given reader and builder.
    pub fn new(reader: Arc<dyn TextReader>, builder: Arc<dyn DocumentBuilder>) -> Self {
        Self {
            reader: Some(reader),
            builder: Some(builder),
        }
    }

    /// The built-in `lopdf` reader and `docx-rs` builder, when compiled in.
    pub fn with_defaults() -> Self {
        #[cfg(feature = "fallback")]
        {
            Self::new(
                Arc::new(crate::backend::LopdfTextReader::new()),
                Arc::new(crate::backend::DocxBuilder::new()),
            )
        }
        #[cfg(not(feature = "fallback"))]
        {
            Self::unavailable()
        }
    }

    /// A converter that always fails with [`Error::FallbackUnavailable`].
    pub fn unavailable() -> Self {
        Self {
            reader: None,
            builder: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.reader.is_some() && self.builder.is_some()
    }

    /// Convert `request` keeping only the text.
    pub fn convert_text_only(
        &self,
        request: &ConversionRequest,
        budget: &MemoryBudget,
        monitor: &dyn MemoryMonitor,
    ) -> Result<ConvertedDocument> {
        let (reader, builder) = match (&self.reader, &self.builder) {
            (Some(reader), Some(builder)) => (reader, builder),
            _ => {
                return Err(Error::FallbackUnavailable(
                    "the text-only converter was not compiled in (enable the `fallback` feature)"
                        .to_string(),
                ))
            }
        };

        let start = Instant::now();
        let pages = self
            .write_document(reader.as_ref(), builder.as_ref(), request, budget, monitor)
            .map_err(|e| match e {
                Error::FallbackUnavailable(_) | Error::FallbackFailed(_) => e,
                other => Error::FallbackFailed(other.to_string()),
            })?;

        let mut doc = ConvertedDocument::text_only(request.output(), pages);
        doc.size_bytes = fs::metadata(request.output()).map(|m| m.len()).unwrap_or(0);
        doc.elapsed = start.elapsed();
        Ok(doc)
    }

    fn write_document(
        &self,
        reader: &dyn TextReader,
        builder: &dyn DocumentBuilder,
        request: &ConversionRequest,
        budget: &MemoryBudget,
        monitor: &dyn MemoryMonitor,
    ) -> Result<u32> {
        let mut source = reader.open(request.input())?;
        let mut sink = builder.new_document();
        let range = request.pages();
        let total = source.page_count();
        let every = budget.reclaim_every_pages.max(1) as u32;

        let mut written = 0u32;
        for index in (range.start..total).filter(|i| range.includes(*i)) {
            if written > 0 {
                sink.add_page_break();
            }

            let text = source.text_of(index)?;
            for block in text_blocks(&text) {
                sink.add_paragraph(&block);
            }
            written += 1;

            if request.is_verbose() {
                log::info!("Page {}/{} extracted", index + 1, total);
            }
            if written % every == 0 {
                monitor.reclaim(Checkpoint::FallbackPages(written));
            }
        }
        drop(source);

        sink.save(request.output())?;
        Ok(written)
    }
}

impl Default for TextOnlyConverter {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Split extracted page text into paragraph blocks.
///
/// One block per non-blank line, NFC-normalised, with control characters
/// other than tab removed.
pub fn text_blocks(text: &str) -> Vec<String> {
    text.lines()
        .map(clean_line)
        .filter(|line| !line.trim().is_empty())
        .collect()
}

fn clean_line(line: &str) -> String {
    let stripped: String = line
        .chars()
        .filter(|c| *c == '\t' || !c.is_control())
        .collect();
    normalize(stripped.trim_end())
}

#[cfg(feature = "fallback")]
fn normalize(s: &str) -> String {
    use unicode_normalization::UnicodeNormalization;
    s.nfc().collect()
}

#[cfg(not(feature = "fallback"))]
fn normalize(s: &str) -> String {
    s.to_string()
}
