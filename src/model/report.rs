//! Aggregate outcome of a batch run.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::result::ConversionResult;

/// Outcome counts and per-failure detail for a batch conversion.
///
/// `succeeded + failed` always equals the number of files the batch
/// discovered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Items converted successfully
    pub succeeded: usize,

    /// Items that failed
    pub failed: usize,

    /// Failed item name → error message
    pub errors: BTreeMap<String, String>,

    /// Output documents written, in completion order
    pub outputs: Vec<PathBuf>,

    /// Successes produced by the text-only fallback
    pub text_only: usize,

    /// Seconds spent on successful conversions
    pub conversion_secs: f64,

    /// When the batch started
    pub started_at: DateTime<Utc>,

    /// Wall time of the whole batch
    pub elapsed_secs: f64,
}

impl BatchReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self {
            succeeded: 0,
            failed: 0,
            errors: BTreeMap::new(),
            outputs: Vec::new(),
            text_only: 0,
            conversion_secs: 0.0,
            started_at: Utc::now(),
            elapsed_secs: 0.0,
        }
    }

    /// Record the outcome of one item.
    pub fn record(&mut self, name: impl Into<String>, result: &ConversionResult) {
        match result {
            ConversionResult::Success(doc) => {
                self.succeeded += 1;
                self.outputs.push(doc.output_path.clone());
                self.conversion_secs += doc.elapsed.as_secs_f64();
                if doc.is_text_only() {
                    self.text_only += 1;
                }
            }
            ConversionResult::Failure { message } => self.record_failure(name, message.clone()),
        }
    }

    /// Record a failure that never produced a [`ConversionResult`].
    pub fn record_failure(&mut self, name: impl Into<String>, message: impl Into<String>) {
        self.failed += 1;
        self.errors.insert(name.into(), message.into());
    }

    /// Number of items processed.
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Mean conversion time of successful items.
    pub fn average_secs(&self) -> Option<f64> {
        (self.succeeded > 0).then(|| self.conversion_secs / self.succeeded as f64)
    }

    /// Write the summary block to the log.
    pub fn log_summary(&self) {
        let rule = "=".repeat(70);
        log::info!("{}", rule);
        log::info!("CONVERSION SUMMARY");
        log::info!("{}", rule);
        log::info!("Success: {}/{}", self.succeeded, self.total());
        log::info!("Failed: {}/{}", self.failed, self.total());
        if self.text_only > 0 {
            log::info!("Text-only fallback: {}", self.text_only);
        }
        if self.has_failures() {
            log::info!("Failed files:");
            for (name, error) in &self.errors {
                log::info!("  - {}: {}", name, error);
            }
        }
        if let Some(avg) = self.average_secs() {
            log::info!("Average time per file: {:.2}s", avg);
        }
        log::info!("{}", rule);
    }
}

impl Default for BatchReport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed ({} total)",
            self.succeeded,
            self.failed,
            self.total()
        )
    }
}
