//! Request, result and report types exchanged with callers.

mod report;
mod request;
mod result;

pub use report::BatchReport;
pub use request::{default_output_path, ConversionRequest, PageRange, DOCX_EXTENSION};
pub use result::{ConversionResult, ConvertedDocument, Strategy, TEXT_ONLY_WARNING};
