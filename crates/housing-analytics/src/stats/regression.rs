//! Ordinary least squares on one predictor.

use crate::error::{AnalyticsError, Result};
use statrs::distribution::{ContinuousCDF, StudentsT};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// Two-sided p-value for slope = 0
    pub p_value: f64,
    pub n: usize,
}

/// Fit `y = intercept + slope * x`.
///
/// With a perfect fit (including the two-point case) the slope p-value is 0
/// for a non-zero slope and 1 otherwise.
#[allow(clippy::cast_precision_loss)]
pub fn linear_regression(x: &[f64], y: &[f64]) -> Result<LinearFit> {
    if x.len() != y.len() {
        return Err(AnalyticsError::InsufficientData(format!(
            "regression inputs differ in length ({} vs {})",
            x.len(),
            y.len()
        )));
    }
    let n = x.len();
    if n < 2 {
        return Err(AnalyticsError::InsufficientData(format!(
            "regression needs at least 2 observations, got {n}"
        )));
    }

    let nf = n as f64;
    let mean_x = x.iter().sum::<f64>() / nf;
    let mean_y = y.iter().sum::<f64>() / nf;
    let sxx: f64 = x.iter().map(|v| (v - mean_x).powi(2)).sum();
    let syy: f64 = y.iter().map(|v| (v - mean_y).powi(2)).sum();
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| (a - mean_x) * (b - mean_y)).sum();

    if sxx == 0.0 {
        return Err(AnalyticsError::InsufficientData(
            "regression needs at least 2 distinct x values".to_string(),
        ));
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let r_squared = if syy == 0.0 { 0.0 } else { (sxy * sxy) / (sxx * syy) };
    let sse = (syy - slope * sxy).max(0.0);

    let dof = n - 2;
    let perfect = dof == 0 || sse <= syy * 1e-14;
    let p_value = if perfect {
        if slope == 0.0 { 1.0 } else { 0.0 }
    } else {
        let std_err = (sse / dof as f64).sqrt() / sxx.sqrt();
        let t = slope / std_err;
        let dist = StudentsT::new(0.0, 1.0, dof as f64)
            .map_err(|e| AnalyticsError::Statistics(e.to_string()))?;
        (2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0)
    };

    Ok(LinearFit {
        slope,
        intercept,
        r_squared,
        p_value,
        n,
    })
}
