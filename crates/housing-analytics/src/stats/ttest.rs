//! Welch two-sample t-test and Cohen's d.

use crate::error::{AnalyticsError, Result};
use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::statistics::Statistics;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WelchTest {
    pub mean_1: f64,
    pub mean_2: f64,
    /// `mean_1 - mean_2`
    pub mean_diff: f64,
    pub t_statistic: f64,
    pub p_value: f64,
    pub df: f64,
    pub cohens_d: f64,
}

/// Unequal-variance t-test of `a` against `b`.
///
/// Zero variance in both groups yields an infinite statistic (p = 0) when the
/// means differ and t = 0, p = 1 when they coincide.
#[allow(clippy::cast_precision_loss)]
pub fn welch_t_test(a: &[f64], b: &[f64]) -> Result<WelchTest> {
    if a.len() < 2 || b.len() < 2 {
        return Err(AnalyticsError::InsufficientData(format!(
            "t-test needs at least 2 samples per group, got {} and {}",
            a.len(),
            b.len()
        )));
    }

    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let (mean_1, mean_2) = (a.mean(), b.mean());
    let (var_1, var_2) = (a.variance(), b.variance());
    let mean_diff = mean_1 - mean_2;

    let se1 = var_1 / n1;
    let se2 = var_2 / n2;
    let se = (se1 + se2).sqrt();

    let (t_statistic, p_value, df) = if se == 0.0 {
        if mean_diff == 0.0 {
            (0.0, 1.0, n1 + n2 - 2.0)
        } else {
            (mean_diff.signum() * f64::INFINITY, 0.0, n1 + n2 - 2.0)
        }
    } else {
        let t = mean_diff / se;
        let df = (se1 + se2).powi(2)
            / (se1.powi(2) / (n1 - 1.0) + se2.powi(2) / (n2 - 1.0));
        let dist =
            StudentsT::new(0.0, 1.0, df).map_err(|e| AnalyticsError::Statistics(e.to_string()))?;
        (t, (2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0), df)
    };

    let pooled = ((var_1 + var_2) / 2.0).sqrt();
    let cohens_d = if pooled > 0.0 {
        mean_diff / pooled
    } else if mean_diff == 0.0 {
        0.0
    } else {
        mean_diff.signum() * f64::INFINITY
    };

    Ok(WelchTest {
        mean_1,
        mean_2,
        mean_diff,
        t_statistic,
        p_value,
        df,
        cohens_d,
    })
}

/// Conventional magnitude bin for a Cohen's d value.
#[must_use]
pub fn effect_size_label(d: f64) -> &'static str {
    let d = d.abs();
    if d >= 0.8 {
        "large"
    } else if d >= 0.5 {
        "medium"
    } else {
        "small"
    }
}
