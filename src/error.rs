//! Error types for pdfdocx.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pdfdocx operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while converting documents.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input file does not exist.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The size heuristic predicts the primary converter would overrun the budget.
    #[error(
        "Estimated memory {estimated_mb:.1} MB for a {file_mb:.2} MB file exceeds the {budget_mb:.1} MB budget"
    )]
    AdmissionRejected {
        file_mb: f64,
        estimated_mb: f64,
        budget_mb: f64,
    },

    /// Memory pressure was detected during conversion.
    #[error("Memory exhausted: {0}")]
    MemoryExhausted(String),

    /// The rich converter failed for a reason unrelated to memory.
    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    /// The output location cannot be written.
    #[error("Permission denied: {}. Close the file if it's open.", .0.display())]
    PermissionDenied(PathBuf),

    /// The text-only path is missing its reader or builder.
    #[error("Text-only fallback unavailable: {0}")]
    FallbackUnavailable(String),

    /// The text-only path itself failed.
    #[error("Text-only fallback failed: {0}")]
    FallbackFailed(String),

    /// The text-only path failed after memory pressure ruled out the primary one.
    #[error("{cause}; {fallback}")]
    FallbackAfter {
        cause: Box<Error>,
        fallback: Box<Error>,
    },

    /// The file is not recognized as PDF.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// The PDF version header is malformed.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// The PDF document is encrypted.
    #[error("Document is encrypted")]
    Encrypted,

    /// Error extracting text content.
    #[error("Text extraction error: {0}")]
    TextExtract(String),

    /// Page index is out of range.
    #[error("Page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(u32, u32),

    /// A page range string that cannot be parsed.
    #[error("Invalid page range: {0}")]
    InvalidPageRange(String),

    /// Error serializing the output document.
    #[error("Write error: {0}")]
    Write(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the text-only fallback can recover from this error.
    pub fn is_memory_related(&self) -> bool {
        match self {
            Error::AdmissionRejected { .. } | Error::MemoryExhausted(_) => true,
            Error::Io(e) => e.kind() == io::ErrorKind::OutOfMemory,
            _ => false,
        }
    }
}

#[cfg(feature = "fallback")]
impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::TextExtract(err.to_string()),
        }
    }
}
