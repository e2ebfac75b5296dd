//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use pdfdocx::backend::{
    DocumentBuilder, DocumentSink, PagedText, RenderSettings, RichConverter, RichDocument,
    TextReader,
};
use pdfdocx::{Checkpoint, Error, MemoryMonitor, Result};

pub const MB: u64 = 1024 * 1024;

/// Write a file with a PDF header padded to `size` bytes.
pub fn pdf_of_size(dir: &Path, name: &str, size: u64) -> PathBuf {
    let path = dir.join(name);
    let mut file = File::create(&path).unwrap();
    file.write_all(b"%PDF-1.7\n").unwrap();
    file.set_len(size.max(9)).unwrap();
    path
}

/// Monitor with a settable reading that records every checkpoint.
#[derive(Default)]
pub struct RecordingMonitor {
    memory_mb: Mutex<f64>,
    checkpoints: Mutex<Vec<Checkpoint>>,
}

impl RecordingMonitor {
    pub fn reading(mb: f64) -> Self {
        let monitor = Self::default();
        monitor.set_memory(mb);
        monitor
    }

    pub fn set_memory(&self, mb: f64) {
        *self.memory_mb.lock().unwrap() = mb;
    }

    pub fn count(&self, checkpoint: Checkpoint) -> usize {
        self.checkpoints
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == checkpoint)
            .count()
    }

    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        self.checkpoints.lock().unwrap().clone()
    }
}

impl MemoryMonitor for RecordingMonitor {
    fn current_memory_mb(&self) -> f64 {
        *self.memory_mb.lock().unwrap()
    }

    fn reclaim(&self, checkpoint: Checkpoint) {
        self.checkpoints.lock().unwrap().push(checkpoint);
    }
}

#[derive(Default)]
struct FakeRichState {
    opens: AtomicUsize,
    renders: AtomicUsize,
    last_settings: Mutex<Option<RenderSettings>>,
}

/// Rich converter that writes a fixed-size file, or fails/panics on
/// inputs whose file name contains a marker.
#[derive(Clone, Default)]
pub struct FakeRich {
    state: Arc<FakeRichState>,
    output_bytes: usize,
    fail_on: Option<(String, String)>,
    panic_on: Option<String>,
}

impl FakeRich {
    pub fn writing(output_bytes: usize) -> Self {
        Self {
            output_bytes,
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, marker: &str, message: &str) -> Self {
        self.fail_on = Some((marker.to_string(), message.to_string()));
        self
    }

    pub fn panicking_on(mut self, marker: &str) -> Self {
        self.panic_on = Some(marker.to_string());
        self
    }

    pub fn opens(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    pub fn renders(&self) -> usize {
        self.state.renders.load(Ordering::SeqCst)
    }

    pub fn last_settings(&self) -> Option<RenderSettings> {
        *self.state.last_settings.lock().unwrap()
    }
}

impl RichConverter for FakeRich {
    fn name(&self) -> &str {
        "fake"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn RichDocument>> {
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeRichDocument {
            converter: self.clone(),
            input: path.to_path_buf(),
        }))
    }
}

struct FakeRichDocument {
    converter: FakeRich,
    input: PathBuf,
}

impl RichDocument for FakeRichDocument {
    fn render(&mut self, output: &Path, settings: &RenderSettings) -> Result<()> {
        let conv = &self.converter;
        conv.state.renders.fetch_add(1, Ordering::SeqCst);
        *conv.state.last_settings.lock().unwrap() = Some(*settings);

        let name = self.input.file_name().unwrap().to_string_lossy().into_owned();
        if let Some(marker) = &conv.panic_on {
            if name.contains(marker.as_str()) {
                panic!("renderer crashed on {}", name);
            }
        }
        if let Some((marker, message)) = &conv.fail_on {
            if name.contains(marker.as_str()) {
                return Err(Error::ConversionFailed(message.clone()));
            }
        }
        fs::write(output, vec![b'x'; conv.output_bytes])?;
        Ok(())
    }
}

/// Text reader serving the same pages for every input.
pub struct FakeTextReader {
    pages: Vec<String>,
    opens: AtomicUsize,
}

impl FakeTextReader {
    pub fn new(pages: &[&str]) -> Self {
        Self {
            pages: pages.iter().map(|p| p.to_string()).collect(),
            opens: AtomicUsize::new(0),
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl TextReader for FakeTextReader {
    fn open(&self, _path: &Path) -> Result<Box<dyn PagedText>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePages(self.pages.clone())))
    }
}

struct FakePages(Vec<String>);

impl PagedText for FakePages {
    fn page_count(&self) -> u32 {
        self.0.len() as u32
    }

    fn text_of(&mut self, index: u32) -> Result<String> {
        self.0
            .get(index as usize)
            .cloned()
            .ok_or(Error::PageOutOfRange(index, self.page_count()))
    }
}

/// Builder writing paragraphs as lines and page breaks as form feeds.
#[derive(Default)]
pub struct PlainBuilder;

impl DocumentBuilder for PlainBuilder {
    fn new_document(&self) -> Box<dyn DocumentSink> {
        Box::new(PlainSink(String::new()))
    }
}

struct PlainSink(String);

impl DocumentSink for PlainSink {
    fn add_paragraph(&mut self, text: &str) {
        self.0.push_str(text);
        self.0.push('\n');
    }

    fn add_page_break(&mut self) {
        self.0.push('\u{c}');
    }

    fn save(self: Box<Self>, path: &Path) -> Result<()> {
        fs::write(path, self.0)?;
        Ok(())
    }
}
