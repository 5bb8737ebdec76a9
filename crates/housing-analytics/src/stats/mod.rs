//! Statistical kernels used by the analyses.

pub mod anova;
pub mod correlation;
pub mod descriptive;
pub mod regression;
pub mod stl;
pub mod ttest;
pub mod tukey;

pub use anova::{one_way_anova, AnovaResult};
pub use correlation::{pearson, Correlation, Strength};
pub use regression::{linear_regression, LinearFit};
pub use stl::{Stl, StlDecomposition};
pub use ttest::{effect_size_label, welch_t_test, WelchTest};
pub use tukey::{tukey_hsd, TukeyPair};

/// Significance level used by every test.
pub const ALPHA: f64 = 0.05;
