//! Up-front admission check for the primary strategy.
//!
//! The rich converter's peak RAM is approximated as a fixed multiple of the
//! input size on disk. The check is a cheap pre-filter: rejecting a file that
//! would have fit is acceptable, while a file that slips through is still
//! caught by the mid-flight sample in the primary strategy.

use std::fs;
use std::path::Path;

use crate::budget::MemoryBudget;
use crate::error::{Error, Result};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Verdict of [`is_safe_to_attempt`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdmissionDecision {
    Admitted {
        file_mb: f64,
        estimated_mb: f64,
        budget_mb: f64,
    },
    Rejected {
        file_mb: f64,
        estimated_mb: f64,
        budget_mb: f64,
    },
}

impl AdmissionDecision {
    pub fn is_safe(&self) -> bool {
        matches!(self, AdmissionDecision::Admitted { .. })
    }

    pub fn estimated_mb(&self) -> f64 {
        match *self {
            AdmissionDecision::Admitted { estimated_mb, .. }
            | AdmissionDecision::Rejected { estimated_mb, .. } => estimated_mb,
        }
    }

    /// Human-readable explanation of the verdict.
    pub fn reason(&self) -> String {
        match *self {
            AdmissionDecision::Admitted {
                estimated_mb,
                budget_mb,
                ..
            } => format!(
                "Estimated memory {:.1} MB fits the {:.1} MB budget",
                estimated_mb, budget_mb
            ),
            AdmissionDecision::Rejected { .. } => self.to_error().to_string(),
        }
    }

    /// The error a rejection surfaces as when fallback is disabled.
    pub fn to_error(&self) -> Error {
        let (file_mb, estimated_mb, budget_mb) = match *self {
            AdmissionDecision::Admitted {
                file_mb,
                estimated_mb,
                budget_mb,
            }
            | AdmissionDecision::Rejected {
                file_mb,
                estimated_mb,
                budget_mb,
            } => (file_mb, estimated_mb, budget_mb),
        };
        Error::AdmissionRejected {
            file_mb,
            estimated_mb,
            budget_mb,
        }
    }
}

/// Decide whether the primary strategy may run on a file of `file_size_mb`.
///
/// Rejected iff `multiplier * size > budget`; an estimate equal to the
/// budget is admitted. A NaN estimate or budget is always rejected.
pub fn is_safe_to_attempt(file_size_mb: f64, budget: &MemoryBudget) -> AdmissionDecision {
    let estimated_mb = file_size_mb * budget.admission_multiplier;
    let budget_mb = budget.limit_mb;
    let fits = estimated_mb <= budget_mb;

    if !fits {
        AdmissionDecision::Rejected {
            file_mb: file_size_mb,
            estimated_mb,
            budget_mb,
        }
    } else {
        AdmissionDecision::Admitted {
            file_mb: file_size_mb,
            estimated_mb,
            budget_mb,
        }
    }
}

/// Size of `path` on disk in MB.
pub fn file_size_mb(path: &Path) -> Result<f64> {
    Ok(fs::metadata(path)?.len() as f64 / BYTES_PER_MB)
}
