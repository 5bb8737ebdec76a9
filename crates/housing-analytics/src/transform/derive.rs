//! Row-wise derived metrics.
//!
//! Every metric is a pure function of the measures on the same row; a null
//! input or a zero denominator yields null.

use crate::error::Result;
use housing_domain::{Cell, DatasetKind, Frame};

/// IQR above this many months flags a row as highly variable
pub const HIGH_VARIABILITY_IQR: f64 = 10.0;
/// 2-year bottleneck percentage above which a region is in crisis
pub const CRISIS_BOTTLENECK_PCT: f64 = 30.0;

pub fn apply(frame: &mut Frame, kind: DatasetKind) -> Result<()> {
    match kind {
        DatasetKind::Doorlooptijden => lead_time_metrics(frame),
        DatasetKind::WoningenPijplijn => pipeline_metrics(frame),
    }
}

fn numbers(frame: &Frame, column: &str) -> Vec<Option<f64>> {
    frame
        .column_f64(column)
        .unwrap_or_else(|| vec![None; frame.height()])
}

fn combine(
    a: &[Option<f64>],
    b: &[Option<f64>],
    f: impl Fn(f64, f64) -> Option<f64>,
) -> Vec<Option<f64>> {
    a.iter()
        .zip(b)
        .map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => f(*x, *y),
            _ => None,
        })
        .collect()
}

fn cells(values: &[Option<f64>]) -> Vec<Cell> {
    values.iter().map(|v| Cell::from(*v)).collect()
}

fn flags(values: &[Option<f64>], threshold: f64) -> Vec<Cell> {
    values
        .iter()
        .map(|v| v.map(|v| i64::from(v > threshold)).into())
        .collect()
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    (denominator != 0.0).then(|| numerator / denominator)
}

fn percentage(numerator: f64, denominator: f64) -> Option<f64> {
    ratio(numerator, denominator).map(|r| 100.0 * r)
}

fn lead_time_metrics(frame: &mut Frame) -> Result<()> {
    let p10 = numbers(frame, "Doorlooptijd_P10");
    let p25 = numbers(frame, "Doorlooptijd_P25");
    let p75 = numbers(frame, "Doorlooptijd_P75");
    let p90 = numbers(frame, "Doorlooptijd_P90");
    let median = numbers(frame, "Doorlooptijd_Mediaan");

    let iqr = combine(&p75, &p25, |hi, lo| Some(hi - lo));
    let range = combine(&p90, &p10, |hi, lo| Some(hi - lo));
    let cv = combine(&iqr, &median, ratio);

    let flagged = iqr.iter().flatten().filter(|v| **v > HIGH_VARIABILITY_IQR).count();
    tracing::info!(rows = flagged, threshold = HIGH_VARIABILITY_IQR, "flagged high variability");

    frame.set_column("Doorlooptijd_IQR", cells(&iqr))?;
    frame.set_column("Doorlooptijd_P10_P90_Range", cells(&range))?;
    frame.set_column("Hoge_Variabiliteit", flags(&iqr, HIGH_VARIABILITY_IQR))?;
    frame.set_column("Doorlooptijd_CV", cells(&cv))?;
    Ok(())
}

fn pipeline_metrics(frame: &mut Frame) -> Result<()> {
    let total = numbers(frame, "Pijplijn_Totaal");
    let started = numbers(frame, "Pijplijn_BouwGestart");
    let permit = numbers(frame, "Pijplijn_Vergunning");
    let stuck_2y = numbers(frame, "Pijplijn_Vast_2Jaar");
    let started_2y = numbers(frame, "Pijplijn_BouwGestart_2Jaar");
    let permit_2y = numbers(frame, "Pijplijn_Vergunning_2Jaar");
    let stuck_5y = numbers(frame, "Pijplijn_Vast_5Jaar");

    let bottleneck_2y = combine(&stuck_2y, &total, percentage);

    frame.set_column("Bottleneck_2Jaar_Pct", cells(&bottleneck_2y))?;
    frame.set_column("Bottleneck_5Jaar_Pct", cells(&combine(&stuck_5y, &total, percentage)))?;
    frame.set_column(
        "Vergunning_Bottleneck_Pct",
        cells(&combine(&permit_2y, &permit, percentage)),
    )?;
    frame.set_column(
        "Bouw_Bottleneck_Pct",
        cells(&combine(&started_2y, &started, percentage)),
    )?;
    frame.set_column("Vergunning_Fase_Pct", cells(&combine(&permit, &total, percentage)))?;
    frame.set_column("Bouw_Fase_Pct", cells(&combine(&started, &total, percentage)))?;
    frame.set_column("Crisis_Regio", flags(&bottleneck_2y, CRISIS_BOTTLENECK_PCT))?;

    let crisis = bottleneck_2y
        .iter()
        .flatten()
        .filter(|v| **v > CRISIS_BOTTLENECK_PCT)
        .count();
    tracing::info!(rows = crisis, threshold = CRISIS_BOTTLENECK_PCT, "flagged crisis rows");
    Ok(())
}
