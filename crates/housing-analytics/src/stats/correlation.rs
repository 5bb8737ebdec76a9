//! Pearson product-moment correlation.

use crate::error::{AnalyticsError, Result};
use statrs::distribution::{ContinuousCDF, StudentsT};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correlation {
    pub r: f64,
    pub p_value: f64,
    pub n: usize,
}

/// Correlation strength bins on |r|.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strength {
    Weak,
    Moderate,
    Strong,
}

impl Strength {
    #[must_use]
    pub fn of(r: f64) -> Self {
        let r = r.abs();
        if r >= 0.7 {
            Self::Strong
        } else if r >= 0.4 {
            Self::Moderate
        } else {
            Self::Weak
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Weak => "Weak",
            Self::Moderate => "Moderate",
            Self::Strong => "Strong",
        }
    }
}

/// Pearson r with a two-sided p-value from the t distribution on n - 2
/// degrees of freedom. Needs at least 3 pairs and non-constant inputs.
#[allow(clippy::cast_precision_loss)]
pub fn pearson(x: &[f64], y: &[f64]) -> Result<Correlation> {
    let n = x.len();
    if n != y.len() {
        return Err(AnalyticsError::InsufficientData(format!(
            "correlation inputs differ in length ({n} vs {})",
            y.len()
        )));
    }
    if n < 3 {
        return Err(AnalyticsError::InsufficientData(format!(
            "correlation needs at least 3 pairs, got {n}"
        )));
    }

    let nf = n as f64;
    let mean_x = x.iter().sum::<f64>() / nf;
    let mean_y = y.iter().sum::<f64>() / nf;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mean_x, b - mean_y);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return Err(AnalyticsError::InsufficientData(
            "correlation undefined for a constant series".to_string(),
        ));
    }

    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    let dof = nf - 2.0;
    let p_value = if (1.0 - r.abs()) < 1e-12 {
        0.0
    } else {
        let t = r * (dof / (1.0 - r * r)).sqrt();
        let dist =
            StudentsT::new(0.0, 1.0, dof).map_err(|e| AnalyticsError::Statistics(e.to_string()))?;
        (2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0)
    };

    Ok(Correlation { r, p_value, n })
}
