//! Seasonal-trend decomposition by LOESS (Cleveland et al., 1990).
//!
//! Fixed-jump-1 variant with degree-1 local fits for all three smoothers.
//! Positions inside the LOESS kernels are 1-based, matching the published
//! algorithm, so extrapolation points sit at 0 and `k + 1`.

use crate::error::{AnalyticsError, Result};

/// Additive decomposition: `observed = trend + seasonal + residual`.
#[derive(Debug, Clone, PartialEq)]
pub struct StlDecomposition {
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stl {
    period: usize,
    seasonal: usize,
    trend: usize,
    low_pass: usize,
    inner: usize,
    outer: usize,
}

const DEGREE: usize = 1;

impl Stl {
    /// Non-robust fit with the conventional default window lengths for
    /// `period`.
    pub fn new(period: usize) -> Result<Self> {
        if period < 2 {
            return Err(AnalyticsError::InvalidParameter(format!(
                "STL period must be at least 2, got {period}"
            )));
        }
        let seasonal = 7;
        Ok(Self {
            period,
            seasonal,
            trend: default_trend_window(period, seasonal),
            low_pass: next_odd(period + 1),
            inner: 5,
            outer: 0,
        })
    }

    /// Enable bisquare robustness iterations.
    #[must_use]
    pub const fn robust(mut self) -> Self {
        self.inner = 2;
        self.outer = 15;
        self
    }

    /// Smallest series length that can be decomposed.
    #[must_use]
    pub const fn min_observations(&self) -> usize {
        2 * self.period + 1
    }

    pub fn fit(&self, y: &[f64]) -> Result<StlDecomposition> {
        let n = y.len();
        if n < self.min_observations() {
            return Err(AnalyticsError::InsufficientData(format!(
                "STL with period {} needs at least {} observations, got {n}",
                self.period,
                self.min_observations()
            )));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(AnalyticsError::InvalidParameter(
                "STL input contains missing or non-finite values".to_string(),
            ));
        }

        let np = self.period;
        let mut trend = vec![0.0; n];
        let mut seasonal = vec![0.0; n];
        let mut weights = vec![1.0; n];
        let mut use_weights = false;

        for iteration in 0..=self.outer {
            let rw = use_weights.then_some(weights.as_slice());
            for _ in 0..self.inner {
                let detrended: Vec<f64> = y.iter().zip(&trend).map(|(a, t)| a - t).collect();
                let cycle = cycle_subseries_smooth(&detrended, np, self.seasonal, rw);
                let filtered = low_pass_filter(&cycle, np);
                let low = loess_smooth(&filtered, self.low_pass, None);
                for i in 0..n {
                    seasonal[i] = cycle[np + i] - low[i];
                }

                let deseasonalized: Vec<f64> =
                    y.iter().zip(&seasonal).map(|(a, s)| a - s).collect();
                trend = loess_smooth(&deseasonalized, self.trend, rw);
            }

            if iteration == self.outer {
                break;
            }
            let fit: Vec<f64> = trend.iter().zip(&seasonal).map(|(t, s)| t + s).collect();
            weights = robustness_weights(y, &fit);
            use_weights = true;
        }

        let residual = y
            .iter()
            .zip(trend.iter().zip(&seasonal))
            .map(|(v, (t, s))| v - t - s)
            .collect();
        Ok(StlDecomposition {
            trend,
            seasonal,
            residual,
        })
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn default_trend_window(period: usize, seasonal: usize) -> usize {
    let raw = 1.5 * period as f64 / (1.0 - 1.5 / seasonal as f64);
    next_odd(raw.ceil() as usize)
}

const fn next_odd(value: usize) -> usize {
    if value % 2 == 0 { value + 1 } else { value }
}

// =============================================================================
// LOESS KERNELS
// =============================================================================

/// Local linear estimate at 1-based position `xs` from points
/// `nleft..=nright`. `None` when every weight in the window is zero.
#[allow(clippy::cast_precision_loss, clippy::too_many_arguments)]
fn local_estimate(
    y: &[f64],
    len: usize,
    xs: f64,
    nleft: usize,
    nright: usize,
    w: &mut [f64],
    rw: Option<&[f64]>,
) -> Option<f64> {
    let n = y.len();
    let range = n as f64 - 1.0;
    let mut h = (xs - nleft as f64).max(nright as f64 - xs);
    if len > n {
        h += ((len - n) / 2) as f64;
    }
    let h9 = 0.999 * h;
    let h1 = 0.001 * h;

    let mut total = 0.0;
    for j in nleft..=nright {
        let idx = j - 1;
        w[idx] = 0.0;
        let r = (j as f64 - xs).abs();
        if r <= h9 {
            w[idx] = if r <= h1 {
                1.0
            } else {
                (1.0 - (r / h).powi(3)).powi(3)
            };
            if let Some(rw) = rw {
                w[idx] *= rw[idx];
            }
            total += w[idx];
        }
    }
    if total <= 0.0 {
        return None;
    }

    for weight in &mut w[nleft - 1..nright] {
        *weight /= total;
    }
    if h > 0.0 && DEGREE > 0 {
        let center: f64 = (nleft..=nright).map(|j| w[j - 1] * j as f64).sum();
        let spread: f64 = (nleft..=nright)
            .map(|j| w[j - 1] * (j as f64 - center).powi(2))
            .sum();
        if spread.sqrt() > 0.001 * range {
            let slope = (xs - center) / spread;
            for j in nleft..=nright {
                w[j - 1] *= slope.mul_add(j as f64 - center, 1.0);
            }
        }
    }

    Some((nleft..=nright).map(|j| w[j - 1] * y[j - 1]).sum())
}

/// LOESS smoothing at every position with window `len`.
fn loess_smooth(y: &[f64], len: usize, rw: Option<&[f64]>) -> Vec<f64> {
    let n = y.len();
    if n < 2 {
        return y.to_vec();
    }
    let mut work = vec![0.0; n];
    let mut out = vec![0.0; n];

    if len >= n {
        for i in 1..=n {
            out[i - 1] = local_estimate(y, len, pos(i), 1, n, &mut work, rw).unwrap_or(y[i - 1]);
        }
    } else {
        let half = (len + 1) / 2;
        let (mut nleft, mut nright) = (1, len);
        for i in 1..=n {
            if i > half && nright != n {
                nleft += 1;
                nright += 1;
            }
            out[i - 1] =
                local_estimate(y, len, pos(i), nleft, nright, &mut work, rw).unwrap_or(y[i - 1]);
        }
    }
    out
}

/// Smooths each cycle-subseries and extends it one step on both ends. The
/// result has `n + 2 * period` values.
fn cycle_subseries_smooth(y: &[f64], period: usize, len: usize, rw: Option<&[f64]>) -> Vec<f64> {
    let n = y.len();
    let mut out = vec![0.0; n + 2 * period];

    for j in 0..period {
        let k = (n - j - 1) / period + 1;
        let sub: Vec<f64> = (0..k).map(|i| y[i * period + j]).collect();
        let sub_rw: Option<Vec<f64>> = rw.map(|rw| (0..k).map(|i| rw[i * period + j]).collect());
        let sub_rw = sub_rw.as_deref();

        let smoothed = loess_smooth(&sub, len, sub_rw);
        let mut work = vec![0.0; k];
        let left = local_estimate(&sub, len, 0.0, 1, len.min(k), &mut work, sub_rw)
            .unwrap_or(smoothed[0]);
        let right = local_estimate(
            &sub,
            len,
            pos(k + 1),
            (k + 1).saturating_sub(len).max(1),
            k,
            &mut work,
            sub_rw,
        )
        .unwrap_or(smoothed[k - 1]);

        let extended = std::iter::once(left)
            .chain(smoothed)
            .chain(std::iter::once(right));
        for (m, value) in extended.enumerate() {
            out[m * period + j] = value;
        }
    }
    out
}

#[allow(clippy::cast_precision_loss)]
fn moving_average(x: &[f64], len: usize) -> Vec<f64> {
    let count = x.len() + 1 - len;
    let mut out = Vec::with_capacity(count);
    let mut sum: f64 = x[..len].iter().sum();
    out.push(sum / len as f64);
    for j in 1..count {
        sum += x[j + len - 1] - x[j - 1];
        out.push(sum / len as f64);
    }
    out
}

/// Period, period, 3 moving averages; shortens the input by `2 * period`.
fn low_pass_filter(x: &[f64], period: usize) -> Vec<f64> {
    let first = moving_average(x, period);
    let second = moving_average(&first, period);
    moving_average(&second, 3)
}

/// Bisquare weights on the residuals, scaled by six times their median.
fn robustness_weights(y: &[f64], fit: &[f64]) -> Vec<f64> {
    let residuals: Vec<f64> = y.iter().zip(fit).map(|(a, b)| (a - b).abs()).collect();
    let mut sorted = residuals.clone();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    let cmad = 3.0 * (sorted[n / 2] + sorted[n - n / 2 - 1]);
    let c9 = 0.999 * cmad;
    let c1 = 0.001 * cmad;

    residuals
        .into_iter()
        .map(|r| {
            if r <= c1 {
                1.0
            } else if r <= c9 {
                (1.0 - (r / cmad).powi(2)).powi(2)
            } else {
                0.0
            }
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn pos(i: usize) -> f64 {
    i as f64
}
