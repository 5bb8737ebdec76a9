//! Data-quality thresholds applied during transformation.

use serde::{Deserialize, Serialize};

/// Soft quality limits. Violations are reported, never enforced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityRules {
    /// Maximum share of null cells, as a fraction (0.15 = 15%)
    pub max_null_fraction: f64,
    pub min_year: i32,
    pub max_year: i32,
    /// IQR multiplier for the outlier fence
    pub outlier_fence: f64,
}

impl Default for QualityRules {
    fn default() -> Self {
        Self {
            max_null_fraction: 0.15,
            min_year: 2015,
            max_year: 2025,
            outlier_fence: 3.0,
        }
    }
}

impl QualityRules {
    #[must_use]
    pub const fn year_in_range(&self, year: i32) -> bool {
        year >= self.min_year && year <= self.max_year
    }
}
