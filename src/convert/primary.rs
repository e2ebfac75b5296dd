//! Full-fidelity conversion through the rich converter.

use std::io;
use std::sync::Arc;

use regex::RegexSet;

use crate::backend::{RenderSettings, RichConverter};
use crate::budget::MemoryBudget;
use crate::error::{Error, Result};
use crate::model::{ConversionRequest, ConvertedDocument};
use crate::monitor::{Checkpoint, MemoryMonitor};

/// Messages from the external converter that indicate memory trouble.
///
/// Matching converter output is a best-effort heuristic: a converter that
/// reports allocation failure in other words will surface as
/// [`Error::ConversionFailed`] and will not trigger the fallback.
const MEMORY_SIGNATURES: &[&str] = &[
    r"(?i)\bMemoryError\b",
    r"(?i)out[ -]of[ -]memory",
    r"(?i)cannot allocate( memory)?",
    r"(?i)memory allocation (failed|of \d+ bytes failed)",
    r"(?i)bad_alloc",
    r"(?i)\bOOM\b",
];

const PERMISSION_SIGNATURES: &[&str] = &[r"(?i)PermissionError", r"(?i)permission denied"];

/// Where in the primary path a converter error surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Open,
    Render,
}

/// Runs the rich converter with a memory check after open.
pub struct PrimaryStrategy {
    converter: Arc<dyn RichConverter>,
    memory_signatures: RegexSet,
    permission_signatures: RegexSet,
}

impl PrimaryStrategy {
    pub fn new(converter: Arc<dyn RichConverter>) -> Self {
        Self {
            converter,
            memory_signatures: RegexSet::new(MEMORY_SIGNATURES).unwrap(),
            permission_signatures: RegexSet::new(PERMISSION_SIGNATURES).unwrap(),
        }
    }

    /// The rich converter in use.
    pub fn converter(&self) -> &dyn RichConverter {
        self.converter.as_ref()
    }

    /// Convert `request` with the rich converter.
    ///
    /// Fails with [`Error::MemoryExhausted`] when usage after opening the
    /// input is already above the budget's mid-flight threshold, or when
    /// the converter's failure looks memory-related.
    pub fn convert(
        &self,
        request: &ConversionRequest,
        budget: &MemoryBudget,
        monitor: &dyn MemoryMonitor,
    ) -> Result<ConvertedDocument> {
        let mut document = self
            .converter
            .open(request.input())
            .map_err(|e| self.classify(e, request, Stage::Open))?;

        let used_mb = monitor.current_memory_mb();
        let threshold_mb = budget.midflight_threshold_mb();
        if used_mb > threshold_mb {
            drop(document);
            monitor.reclaim(Checkpoint::AfterOpen);
            return Err(Error::MemoryExhausted(format!(
                "{:.1} MB in use after opening {} exceeds {:.0}% of the {:.1} MB budget",
                used_mb,
                request.display_name(),
                budget.midflight_ratio * 100.0,
                budget.limit_mb
            )));
        }

        let settings = RenderSettings {
            pages: request.pages(),
            skip_images: !budget.extract_images,
        };
        let rendered = document.render(request.output(), &settings);
        drop(document);
        monitor.reclaim(Checkpoint::AfterConversion);

        rendered.map_err(|e| self.classify(e, request, Stage::Render))?;
        Ok(ConvertedDocument::primary(request.output()))
    }

    /// Map a converter failure onto the error taxonomy.
    ///
    /// Permission problems only name the output path when they come from
    /// rendering; while opening they concern the input.
    fn classify(&self, err: Error, request: &ConversionRequest, stage: Stage) -> Error {
        match err {
            Error::ConversionFailed(message) => {
                if self.memory_signatures.is_match(&message) {
                    Error::MemoryExhausted(message)
                } else if stage == Stage::Render && self.permission_signatures.is_match(&message)
                {
                    Error::PermissionDenied(request.output().to_path_buf())
                } else {
                    Error::ConversionFailed(message)
                }
            }
            Error::Io(e) => match (e.kind(), stage) {
                (io::ErrorKind::OutOfMemory, _) => Error::MemoryExhausted(e.to_string()),
                (io::ErrorKind::PermissionDenied, Stage::Render) => {
                    Error::PermissionDenied(request.output().to_path_buf())
                }
                (_, Stage::Open) => Error::ConversionFailed(format!(
                    "cannot read {}: {}",
                    request.input().display(),
                    e
                )),
                (_, Stage::Render) => Error::ConversionFailed(e.to_string()),
            },
            other => other,
        }
    }

    /// Whether `message` matches a known memory-failure signature.
    pub fn is_memory_signature(&self, message: &str) -> bool {
        self.memory_signatures.is_match(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RichDocument;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        fail_with: Option<&'static str>,
        open_error: Option<io::ErrorKind>,
        renders: AtomicUsize,
    }

    struct ScriptedDoc<'a>(&'a Scripted);

    impl RichConverter for &'static Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn open(&self, _path: &Path) -> Result<Box<dyn RichDocument>> {
            if let Some(kind) = self.open_error {
                return Err(io::Error::from(kind).into());
            }
            Ok(Box::new(ScriptedDoc(*self)))
        }
    }

    impl RichDocument for ScriptedDoc<'static> {
        fn render(&mut self, output: &Path, _settings: &RenderSettings) -> Result<()> {
            self.0.renders.fetch_add(1, Ordering::SeqCst);
            match self.0.fail_with {
                Some(msg) => Err(Error::ConversionFailed(msg.to_string())),
                None => {
                    std::fs::write(output, b"docx")?;
                    Ok(())
                }
            }
        }
    }

    struct FixedMemory(f64);

    impl MemoryMonitor for FixedMemory {
        fn current_memory_mb(&self) -> f64 {
            self.0
        }
    }

    fn scripted(fail_with: Option<&'static str>) -> &'static Scripted {
        Box::leak(Box::new(Scripted {
            fail_with,
            open_error: None,
            renders: AtomicUsize::new(0),
        }))
    }

    fn unreadable(kind: io::ErrorKind) -> &'static Scripted {
        Box::leak(Box::new(Scripted {
            fail_with: None,
            open_error: Some(kind),
            renders: AtomicUsize::new(0),
        }))
    }

    fn request(dir: &tempfile::TempDir) -> ConversionRequest {
        let input = dir.path().join("in.pdf");
        std::fs::write(&input, b"%PDF-1.4\n").unwrap();
        ConversionRequest::new(input)
    }

    #[test]
    fn test_converts_under_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let conv = scripted(None);
        let strategy = PrimaryStrategy::new(Arc::new(conv));
        let budget = MemoryBudget::new().with_limit_mb(400.0);

        let doc = strategy
            .convert(&request(&dir), &budget, &FixedMemory(100.0))
            .unwrap();
        assert!(doc.output_path.exists());
        assert_eq!(conv.renders.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_aborts_above_threshold_without_rendering() {
        let dir = tempfile::tempdir().unwrap();
        let conv = scripted(None);
        let strategy = PrimaryStrategy::new(Arc::new(conv));
        let budget = MemoryBudget::new().with_limit_mb(400.0);

        let err = strategy
            .convert(&request(&dir), &budget, &FixedMemory(321.0))
            .unwrap_err();
        assert!(matches!(err, Error::MemoryExhausted(_)));
        assert_eq!(conv.renders.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_memory_flavored_failure_is_classified() {
        let dir = tempfile::tempdir().unwrap();
        let strategy =
            PrimaryStrategy::new(Arc::new(scripted(Some("Traceback ... MemoryError"))));
        let err = strategy
            .convert(&request(&dir), &MemoryBudget::new(), &FixedMemory(0.0))
            .unwrap_err();
        assert!(err.is_memory_related());
    }

    #[test]
    fn test_structural_failure_stays_conversion_failed() {
        let dir = tempfile::tempdir().unwrap();
        let strategy = PrimaryStrategy::new(Arc::new(scripted(Some("invalid xref table"))));
        let err = strategy
            .convert(&request(&dir), &MemoryBudget::new(), &FixedMemory(0.0))
            .unwrap_err();
        assert!(matches!(err, Error::ConversionFailed(ref m) if m == "invalid xref table"));
    }

    #[test]
    fn test_permission_failure_names_output() {
        let dir = tempfile::tempdir().unwrap();
        let strategy = PrimaryStrategy::new(Arc::new(scripted(Some(
            "PermissionError: [Errno 13] Permission denied: 'in.docx'",
        ))));
        let err = strategy
            .convert(&request(&dir), &MemoryBudget::new(), &FixedMemory(0.0))
            .unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
        assert!(err.to_string().contains("Close the file"));
    }

    #[test]
    fn test_permission_failure_on_open_names_input() {
        let dir = tempfile::tempdir().unwrap();
        let request = request(&dir);
        let strategy =
            PrimaryStrategy::new(Arc::new(unreadable(io::ErrorKind::PermissionDenied)));
        let err = strategy
            .convert(&request, &MemoryBudget::new(), &FixedMemory(0.0))
            .unwrap_err();

        assert!(matches!(err, Error::ConversionFailed(_)), "{:?}", err);
        let message = err.to_string();
        assert!(message.contains("in.pdf"), "{}", message);
        assert!(!message.contains("in.docx"), "{}", message);
        assert!(!message.contains("Close the file"), "{}", message);
    }

    #[test]
    fn test_unexecutable_converter_does_not_blame_output() {
        let dir = tempfile::tempdir().unwrap();
        let strategy = PrimaryStrategy::new(Arc::new(scripted(Some(
            "/opt/tools/pdf2docx cannot be executed (check its file mode)",
        ))));
        let err = strategy
            .convert(&request(&dir), &MemoryBudget::new(), &FixedMemory(0.0))
            .unwrap_err();
        assert!(matches!(err, Error::ConversionFailed(_)), "{:?}", err);
    }

    #[test]
    fn test_memory_signatures() {
        let strategy = PrimaryStrategy::new(Arc::new(scripted(None)));
        assert!(strategy.is_memory_signature("MemoryError"));
        assert!(strategy.is_memory_signature("fatal: Out of memory"));
        assert!(strategy.is_memory_signature("was killed by signal 9 (likely out of memory)"));
        assert!(strategy.is_memory_signature("std::bad_alloc"));
        assert!(strategy.is_memory_signature("mmap: Cannot allocate memory"));
        assert!(!strategy.is_memory_signature("invalid page tree"));
        assert!(!strategy.is_memory_signature("font not found"));
    }
}
