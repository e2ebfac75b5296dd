//! # pdfdocx
//!
//! Memory-budgeted PDF to DOCX conversion.
//!
//! Every conversion runs under a [`MemoryBudget`]. Files that are unlikely
//! to fit are routed straight to a text-only fallback; files that run out
//! of memory mid-conversion are retried with it. The caller always gets a
//! definite [`ConversionResult`]: an output path or an error message.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdfdocx::{convert_file, MemoryBudget};
//!
//! let result = convert_file("report.pdf", &MemoryBudget::new().with_limit_mb(400.0));
//! let (ok, detail) = result.summary();
//! println!("{} {}", if ok { "wrote" } else { "failed:" }, detail);
//! ```
//!
//! ## Features
//!
//! - **Admission check**: `10 × file size` against the budget before the
//!   expensive converter runs
//! - **Mid-flight check**: abort the rich converter above 80% of the budget
//! - **Text-only fallback**: page-by-page extraction with `lopdf`, written
//!   with `docx-rs` (feature `fallback`, on by default)
//! - **Batch conversion**: memory-constrained (sequential) or parallel
//!   folder conversion with per-file isolation

pub mod admission;
pub mod backend;
pub mod budget;
pub mod convert;
pub mod detect;
pub mod error;
pub mod model;
pub mod monitor;

// Re-export commonly used types
pub use admission::{is_safe_to_attempt, AdmissionDecision};
pub use backend::{CommandConverter, RenderSettings, RichConverter, RichDocument};
pub use budget::{is_valid_limit, MemoryBudget};
pub use convert::{
    BatchConverter, BatchItem, BatchMode, BatchOptions, Converter, PrimaryStrategy,
    TextOnlyConverter,
};
pub use detect::{detect_format_from_bytes, detect_format_from_path, is_pdf, PdfFormat};
pub use error::{Error, Result};
pub use model::{
    BatchReport, ConversionRequest, ConversionResult, ConvertedDocument, PageRange, Strategy,
};
pub use monitor::{Checkpoint, MemoryMonitor, SystemMonitor};

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Convert a PDF next to itself (`report.pdf` → `report.docx`).
///
/// # Example
///
/// ```no_run
/// use pdfdocx::{convert_file, MemoryBudget};
///
/// let result = convert_file("scan.pdf", &MemoryBudget::default());
/// if let Some(doc) = result.document() {
///     for warning in &doc.warnings {
///         eprintln!("warning: {}", warning);
///     }
/// }
/// ```
pub fn convert_file<P: AsRef<Path>>(input: P, budget: &MemoryBudget) -> ConversionResult {
    Converter::new(budget.clone())
        .convert_with_memory_monitoring(&ConversionRequest::new(input.as_ref()))
}

/// Convert a PDF to an explicit output path.
pub fn convert_file_to<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    budget: &MemoryBudget,
) -> ConversionResult {
    let request = ConversionRequest::new(input.as_ref()).with_output(output.as_ref());
    Converter::new(budget.clone()).convert_with_memory_monitoring(&request)
}

/// Convert every PDF in a folder, one file at a time.
///
/// # Example
///
/// ```no_run
/// use pdfdocx::{convert_folder, MemoryBudget};
///
/// let report = convert_folder("inbox", Some("converted".as_ref()), &MemoryBudget::default())?;
/// println!("{}", report);
/// # Ok::<(), pdfdocx::Error>(())
/// ```
pub fn convert_folder<P: AsRef<Path>>(
    input_dir: P,
    output_dir: Option<&Path>,
    budget: &MemoryBudget,
) -> Result<BatchReport> {
    BatchConverter::new(Converter::new(budget.clone()), BatchOptions::default())
        .convert_batch(input_dir.as_ref(), output_dir)
}

/// Builder for configuring and running conversions.
///
/// # Example
///
/// ```no_run
/// use pdfdocx::Pdfdocx;
///
/// let report = Pdfdocx::new()
///     .with_memory_limit_mb(1024.0)
///     .with_images(false)
///     .parallel(4)
///     .convert_folder("inbox", None)?;
/// println!("{}", report);
/// # Ok::<(), pdfdocx::Error>(())
/// ```
pub struct Pdfdocx {
    budget: MemoryBudget,
    program: Option<PathBuf>,
    batch: BatchOptions,
    verbose: bool,
}

impl Pdfdocx {
    /// Create a new builder with the default budget.
    pub fn new() -> Self {
        Self {
            budget: MemoryBudget::default(),
            program: None,
            batch: BatchOptions::default(),
            verbose: false,
        }
    }

    /// Use an explicit budget.
    pub fn with_budget(mut self, budget: MemoryBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Set the memory budget in MB.
    pub fn with_memory_limit_mb(mut self, mb: f64) -> Self {
        self.budget = self.budget.with_limit_mb(mb);
        self
    }

    /// Enable or disable image extraction.
    pub fn with_images(mut self, extract: bool) -> Self {
        self.budget = self.budget.with_images(extract);
        self
    }

    /// Never fall back to text-only conversion.
    pub fn without_fallback(mut self) -> Self {
        self.budget = self.budget.without_fallback();
        self
    }

    /// Use a different rich converter executable.
    pub fn with_converter_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Convert batches on `workers` threads.
    pub fn parallel(mut self, workers: usize) -> Self {
        self.batch = self.batch.parallel(workers);
        self
    }

    /// Descend into sub-directories in batch mode.
    pub fn recursive(mut self) -> Self {
        self.batch = self.batch.recursive(true);
        self
    }

    /// Log per-page progress.
    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self.batch = self.batch.verbose(true);
        self
    }

    /// Build the configured [`Converter`].
    pub fn build(&self) -> Converter {
        let converter = Converter::new(self.budget.clone());
        match &self.program {
            Some(program) => converter
                .with_rich_converter(Arc::new(CommandConverter::new().with_program(program))),
            None => converter,
        }
    }

    /// Convert one file next to itself.
    pub fn convert<P: AsRef<Path>>(&self, input: P) -> ConversionResult {
        let request = ConversionRequest::new(input.as_ref()).verbose(self.verbose);
        self.build().convert_with_memory_monitoring(&request)
    }

    /// Convert every PDF in a folder.
    pub fn convert_folder<P: AsRef<Path>>(
        &self,
        input_dir: P,
        output_dir: Option<&Path>,
    ) -> Result<BatchReport> {
        BatchConverter::new(self.build(), self.batch.clone())
            .convert_batch(input_dir.as_ref(), output_dir)
    }
}

impl Default for Pdfdocx {
    fn default() -> Self {
        Self::new()
    }
}
