//! Memory budget configuration.

use serde::{Deserialize, Serialize};

/// Default memory ceiling in MB.
pub const DEFAULT_LIMIT_MB: f64 = 512.0;

/// Default ratio between estimated peak RAM and input size.
///
/// Unvalidated against real converter behavior; tune per deployment.
pub const DEFAULT_ADMISSION_MULTIPLIER: f64 = 10.0;

/// Default fraction of the budget that aborts the primary path after open.
///
/// Unvalidated against real converter behavior; tune per deployment.
pub const DEFAULT_MIDFLIGHT_RATIO: f64 = 0.8;

/// Default number of fallback pages between reclamation checkpoints.
pub const DEFAULT_RECLAIM_EVERY_PAGES: usize = 5;

/// Whether `mb` can serve as a memory ceiling.
pub fn is_valid_limit(mb: f64) -> bool {
    mb.is_finite() && mb > 0.0
}

/// Memory budget shared by every conversion of a [`Converter`](crate::Converter).
///
/// Built once at startup and handed to the converter; strategies only ever
/// see it by shared reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryBudget {
    /// Memory ceiling in MB
    pub limit_mb: f64,

    /// Ask the rich converter to embed images
    pub extract_images: bool,

    /// Fall back to text-only conversion on memory pressure
    pub fallback_enabled: bool,

    /// Estimated peak RAM = multiplier x input size
    pub admission_multiplier: f64,

    /// Fraction of `limit_mb` that aborts the primary path after open
    pub midflight_ratio: f64,

    /// Pages between reclamation checkpoints in the fallback path
    pub reclaim_every_pages: usize,
}

impl MemoryBudget {
    /// Create a budget with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the memory ceiling in MB.
    ///
    /// A limit that is not a positive finite number is ignored and the
    /// previous ceiling is kept.
    pub fn with_limit_mb(mut self, mb: f64) -> Self {
        if is_valid_limit(mb) {
            self.limit_mb = mb;
        } else {
            log::warn!(
                "Ignoring memory limit {} MB, keeping {} MB",
                mb,
                self.limit_mb
            );
        }
        self
    }

    /// Enable or disable image extraction in the primary path.
    pub fn with_images(mut self, extract: bool) -> Self {
        self.extract_images = extract;
        self
    }

    /// Enable or disable the text-only fallback.
    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_enabled = enabled;
        self
    }

    /// Disable the text-only fallback.
    pub fn without_fallback(self) -> Self {
        self.with_fallback(false)
    }

    /// Set the admission multiplier.
    pub fn with_admission_multiplier(mut self, multiplier: f64) -> Self {
        self.admission_multiplier = multiplier;
        self
    }

    /// Set the mid-flight abort ratio (clamped to `0.0..=1.0`).
    pub fn with_midflight_ratio(mut self, ratio: f64) -> Self {
        self.midflight_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// Set the fallback reclamation interval (at least one page).
    pub fn with_reclaim_every_pages(mut self, pages: usize) -> Self {
        self.reclaim_every_pages = pages.max(1);
        self
    }

    /// Memory usage above which the primary path aborts after open.
    pub fn midflight_threshold_mb(&self) -> f64 {
        self.limit_mb * self.midflight_ratio
    }
}

impl Default for MemoryBudget {
    fn default() -> Self {
        Self {
            limit_mb: DEFAULT_LIMIT_MB,
            extract_images: true,
            fallback_enabled: true,
            admission_multiplier: DEFAULT_ADMISSION_MULTIPLIER,
            midflight_ratio: DEFAULT_MIDFLIGHT_RATIO,
            reclaim_every_pages: DEFAULT_RECLAIM_EVERY_PAGES,
        }
    }
}
