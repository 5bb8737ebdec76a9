//! One-way analysis of variance.

use crate::error::{AnalyticsError, Result};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnovaResult {
    pub f_statistic: f64,
    pub p_value: f64,
    /// SS-between / SS-total, 0 when there is no variance at all
    pub eta_squared: f64,
    pub df_between: usize,
    pub df_within: usize,
    /// Mean square within groups
    pub ms_within: f64,
}

/// F-test across `groups`. Needs at least two groups and more observations
/// than groups.
#[allow(clippy::cast_precision_loss)]
pub fn one_way_anova(groups: &[Vec<f64>]) -> Result<AnovaResult> {
    let k = groups.len();
    let n: usize = groups.iter().map(Vec::len).sum();
    if k < 2 || groups.iter().any(Vec::is_empty) {
        return Err(AnalyticsError::InsufficientData(format!(
            "ANOVA needs at least 2 non-empty groups, got {k}"
        )));
    }
    if n <= k {
        return Err(AnalyticsError::InsufficientData(format!(
            "ANOVA needs more observations ({n}) than groups ({k})"
        )));
    }

    let grand_mean = groups.iter().flatten().sum::<f64>() / n as f64;
    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for group in groups {
        let mean = group.iter().sum::<f64>() / group.len() as f64;
        ss_between += group.len() as f64 * (mean - grand_mean).powi(2);
        ss_within += group.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    }
    let ss_total = ss_between + ss_within;

    let df_between = k - 1;
    let df_within = n - k;
    let ms_between = ss_between / df_between as f64;
    let ms_within = ss_within / df_within as f64;

    let (f_statistic, p_value) = if ms_within == 0.0 {
        if ms_between == 0.0 {
            (f64::NAN, 1.0)
        } else {
            (f64::INFINITY, 0.0)
        }
    } else {
        let f = ms_between / ms_within;
        let dist = FisherSnedecor::new(df_between as f64, df_within as f64)
            .map_err(|e| AnalyticsError::Statistics(e.to_string()))?;
        (f, (1.0 - dist.cdf(f)).clamp(0.0, 1.0))
    };

    let eta_squared = if ss_total > 0.0 {
        ss_between / ss_total
    } else {
        0.0
    };

    Ok(AnovaResult {
        f_statistic,
        p_value,
        eta_squared,
        df_between,
        df_within,
        ms_within,
    })
}
