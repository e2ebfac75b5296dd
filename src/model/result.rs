//! Outcome of a single conversion.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Warning attached to every text-only conversion.
pub const TEXT_ONLY_WARNING: &str =
    "Converted with the text-only fallback: images and complex formatting are not preserved";

/// Which strategy produced the output document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Full-fidelity rich converter
    Primary,
    /// Page-by-page text extraction
    TextOnly,
}

/// A document successfully written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertedDocument {
    /// Where the DOCX was written
    pub output_path: PathBuf,

    /// Strategy that produced it
    pub strategy: Strategy,

    /// Fidelity or quality warnings
    pub warnings: Vec<String>,

    /// Pages written (known for the text-only path)
    pub pages: Option<u32>,

    /// Output size in bytes
    pub size_bytes: u64,

    /// Wall time spent converting
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl ConvertedDocument {
    /// Output of the primary strategy.
    pub fn primary(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            strategy: Strategy::Primary,
            warnings: Vec::new(),
            pages: None,
            size_bytes: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Output of the text-only fallback; always carries [`TEXT_ONLY_WARNING`].
    pub fn text_only(output_path: impl Into<PathBuf>, pages: u32) -> Self {
        Self {
            output_path: output_path.into(),
            strategy: Strategy::TextOnly,
            warnings: vec![TEXT_ONLY_WARNING.to_string()],
            pages: Some(pages),
            size_bytes: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Add a warning.
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }

    pub fn is_text_only(&self) -> bool {
        self.strategy == Strategy::TextOnly
    }
}

/// Definite outcome of a conversion: a written document or a reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionResult {
    Success(ConvertedDocument),
    Failure { message: String },
}

impl ConversionResult {
    /// Build a failure from an error; the message is never empty.
    pub fn failure(err: &Error) -> Self {
        Self::failure_message(err.to_string())
    }

    /// Build a failure from a message; blank messages get a generic reason.
    pub fn failure_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            "Conversion failed for an unknown reason".to_string()
        } else {
            message
        };
        Self::Failure { message }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn document(&self) -> Option<&ConvertedDocument> {
        match self {
            Self::Success(doc) => Some(doc),
            Self::Failure { .. } => None,
        }
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.document().map(|doc| doc.output_path.as_path())
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure { message } => Some(message),
        }
    }

    /// `(success, output path or error message)`, the shape shells print.
    pub fn summary(&self) -> (bool, String) {
        match self {
            Self::Success(doc) => (true, doc.output_path.display().to_string()),
            Self::Failure { message } => (false, message.clone()),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}
