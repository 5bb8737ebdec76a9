//! Yearly lead-time trend.

use super::{stat, P_VALUE_PLACES, STAT_PLACES};
use crate::error::{AnalyticsError, Result};
use crate::stats::{linear_regression, ALPHA};
use housing_domain::{Cell, Frame};
use std::collections::BTreeMap;

pub const COLUMNS: [&str; 3] = ["metric", "value", "interpretation"];

/// OLS of the yearly mean `Doorlooptijd_Mediaan` on `Jaar`.
#[allow(clippy::cast_precision_loss)]
pub fn temporal_trend(doorlooptijden: &Frame) -> Result<Frame> {
    doorlooptijden.require(&["Jaar", "Doorlooptijd_Mediaan"], "doorlooptijden")?;

    let years = doorlooptijden.column_f64("Jaar").unwrap_or_default();
    let medians = doorlooptijden.column_f64("Doorlooptijd_Mediaan").unwrap_or_default();

    let mut yearly: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
    for (year, median) in years.iter().zip(&medians) {
        if let (Some(year), Some(median)) = (year, median) {
            #[allow(clippy::cast_possible_truncation)]
            let entry = yearly.entry(*year as i64).or_insert((0.0, 0));
            entry.0 += median;
            entry.1 += 1;
        }
    }
    if yearly.len() < 2 {
        return Err(AnalyticsError::InsufficientData(format!(
            "not enough yearly observations for regression ({})",
            yearly.len()
        )));
    }

    let x: Vec<f64> = yearly.keys().map(|y| *y as f64).collect();
    let y: Vec<f64> = yearly.values().map(|(sum, n)| sum / *n as f64).collect();
    let fit = linear_regression(&x, &y)?;
    let significant = fit.p_value < ALPHA;
    let first_year = yearly.keys().next().copied().unwrap_or_default();

    tracing::info!(
        slope = %format_args!("{:.4}", fit.slope),
        r_squared = %format_args!("{:.4}", fit.r_squared),
        p_value = %format_args!("{:.4}", fit.p_value),
        years = fit.n,
        "temporal regression"
    );

    let direction = if fit.slope > 0.0 { "stijgt" } else { "daalt" };
    let verdict = if fit.p_value < 0.01 {
        "Highly significant (p<0.01)"
    } else if significant {
        "Significant (p<0.05)"
    } else {
        "Not significant (p>=0.05)"
    };

    let mut table = Frame::with_columns(COLUMNS);
    let rows = [
        (
            "slope",
            stat(fit.slope, STAT_PLACES),
            format!("Doorlooptijd {direction} {:.2} maanden per jaar", fit.slope.abs()),
        ),
        (
            "intercept",
            stat(fit.intercept, STAT_PLACES),
            format!("Baseline doorlooptijd in {first_year}"),
        ),
        (
            "r_squared",
            stat(fit.r_squared, STAT_PLACES),
            format!("{:.1}% variance verklaard door tijd", fit.r_squared * 100.0),
        ),
        ("p_value", stat(fit.p_value, P_VALUE_PLACES), verdict.to_string()),
        (
            "significant",
            Cell::from(f64::from(u8::from(significant))),
            if significant {
                "Trend is statistisch significant".to_string()
            } else {
                "Trend is niet statistisch significant".to_string()
            },
        ),
    ];
    for (metric, value, interpretation) in rows {
        table.push_row(vec![Cell::from(metric), value, Cell::from(interpretation)])?;
    }
    Ok(table)
}
