//! Memory-aware conversion orchestration.
//!
//! [`Converter`] runs one conversion end to end: admission check, the
//! rich [`PrimaryStrategy`], and the [`TextOnlyConverter`] fallback when
//! the primary path runs out of memory. [`BatchConverter`] applies it to
//! every PDF in a folder.
//!
//! # Example
//!
//! ```no_run
//! use pdfdocx::{ConversionRequest, Converter, MemoryBudget};
//!
//! let converter = Converter::new(MemoryBudget::new().with_limit_mb(400.0));
//! let result = converter.convert_with_memory_monitoring(&ConversionRequest::new("report.pdf"));
//! match result.output_path() {
//!     Some(path) => println!("Wrote {}", path.display()),
//!     None => eprintln!("{}", result.error_message().unwrap_or_default()),
//! }
//! ```

mod batch;
mod fallback;
mod primary;

pub use batch::{BatchConverter, BatchItem, BatchMode, BatchOptions};
pub use fallback::{text_blocks, TextOnlyConverter};
pub use primary::PrimaryStrategy;

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::admission::{file_size_mb, is_safe_to_attempt};
use crate::backend::{CommandConverter, RichConverter};
use crate::budget::MemoryBudget;
use crate::error::{Error, Result};
use crate::model::{ConversionRequest, ConversionResult, ConvertedDocument};
use crate::monitor::{Checkpoint, ExitCheckpoint, MemoryMonitor, SystemMonitor};

/// Outputs this small usually mean the PDF is scanned images.
const SCANNED_HINT_BYTES: u64 = 1000;

/// Warning attached to suspiciously small primary outputs.
pub const SCANNED_HINT: &str =
    "Small output detected; this might be a scanned PDF. Consider running OCR first";

/// Single-file conversion under a [`MemoryBudget`].
pub struct Converter {
    budget: MemoryBudget,
    monitor: Arc<dyn MemoryMonitor>,
    primary: PrimaryStrategy,
    fallback: TextOnlyConverter,
}

impl Converter {
    /// A converter using `pdf2docx`, the process RSS monitor and the
    /// built-in text-only fallback.
    pub fn new(budget: MemoryBudget) -> Self {
        Self {
            budget,
            monitor: Arc::new(SystemMonitor::new()),
            primary: PrimaryStrategy::new(Arc::new(CommandConverter::new())),
            fallback: TextOnlyConverter::with_defaults(),
        }
    }

    /// Replace the rich converter.
    pub fn with_rich_converter(mut self, converter: Arc<dyn RichConverter>) -> Self {
        self.primary = PrimaryStrategy::new(converter);
        self
    }

    /// Replace the memory monitor.
    pub fn with_monitor(mut self, monitor: Arc<dyn MemoryMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Replace the text-only fallback.
    pub fn with_fallback(mut self, fallback: TextOnlyConverter) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn budget(&self) -> &MemoryBudget {
        &self.budget
    }

    pub fn monitor(&self) -> &dyn MemoryMonitor {
        self.monitor.as_ref()
    }

    /// Whether the rich converter can run here.
    pub fn rich_converter_available(&self) -> bool {
        self.primary.converter().is_available()
    }

    /// Whether the text-only fallback is usable.
    pub fn fallback_available(&self) -> bool {
        self.fallback.is_available()
    }

    /// Convert one file, falling back to text-only on memory pressure.
    ///
    /// Never panics on bad input and never returns an error: every failure
    /// is reported as [`ConversionResult::Failure`] with a non-empty
    /// message. [`Checkpoint::Exit`] fires exactly once per call.
    pub fn convert_with_memory_monitoring(&self, request: &ConversionRequest) -> ConversionResult {
        let _exit = ExitCheckpoint::new(self.monitor.as_ref());
        let start = Instant::now();

        if request.is_verbose() {
            log::info!("Converting: {}", request.display_name());
            log::info!("Pages: {}", request.pages());
        }

        match self.run(request) {
            Ok(mut doc) => {
                doc.elapsed = start.elapsed();
                if request.is_verbose() {
                    log::info!("Output: {}", doc.output_path.display());
                    log::info!("Size: {:.2} MB", doc.size_mb());
                    log::info!("Time: {:.2}s", doc.elapsed.as_secs_f64());
                }
                ConversionResult::Success(doc)
            }
            Err(e) => {
                log::error!("{}: {}", request.display_name(), e);
                ConversionResult::failure(&e)
            }
        }
    }

    fn run(&self, request: &ConversionRequest) -> Result<ConvertedDocument> {
        let input = request.input();
        if !input.is_file() {
            return Err(Error::NotFound(input.to_path_buf()));
        }
        ensure_parent_dir(request.output())?;

        let decision = is_safe_to_attempt(file_size_mb(input)?, &self.budget);
        if !decision.is_safe() {
            if !self.budget.fallback_enabled {
                return Err(decision.to_error());
            }
            log::warn!(
                "{}: {}; using the text-only converter",
                request.display_name(),
                decision.reason()
            );
            return self
                .run_fallback(request)
                .map_err(|e| fallback_after(decision.to_error(), e));
        }

        self.monitor.reclaim(Checkpoint::Baseline);
        let baseline_mb = self.monitor.current_memory_mb();
        log::debug!("Baseline memory before conversion: {:.1} MB", baseline_mb);

        match self
            .primary
            .convert(request, &self.budget, self.monitor.as_ref())
        {
            Ok(doc) => self.verify_primary(doc),
            Err(e) if e.is_memory_related() && self.budget.fallback_enabled => {
                log::warn!(
                    "{}: {}; retrying with the text-only converter",
                    request.display_name(),
                    e
                );
                self.run_fallback(request).map_err(|fallback| fallback_after(e, fallback))
            }
            Err(e) => Err(e),
        }
    }

    fn verify_primary(&self, mut doc: ConvertedDocument) -> Result<ConvertedDocument> {
        let size = match fs::metadata(&doc.output_path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::ConversionFailed(format!(
                    "conversion reported success but {} was not created",
                    doc.output_path.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };

        doc.size_bytes = size;
        if size <= SCANNED_HINT_BYTES {
            log::warn!("{}: {}", doc.output_path.display(), SCANNED_HINT);
            doc = doc.with_warning(SCANNED_HINT);
        }
        Ok(doc)
    }

    fn run_fallback(&self, request: &ConversionRequest) -> Result<ConvertedDocument> {
        let doc = self
            .fallback
            .convert_text_only(request, &self.budget, self.monitor.as_ref())?;
        for warning in &doc.warnings {
            log::warn!("{}: {}", request.display_name(), warning);
        }
        Ok(doc)
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(MemoryBudget::default())
    }
}

fn fallback_after(cause: Error, fallback: Error) -> Error {
    Error::FallbackAfter {
        cause: Box::new(cause),
        fallback: Box::new(fallback),
    }
}

fn ensure_parent_dir(output: &Path) -> Result<()> {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| match e.kind() {
                io::ErrorKind::PermissionDenied => Error::PermissionDenied(parent.to_path_buf()),
                _ => Error::Io(e),
            })
        }
        _ => Ok(()),
    }
}
