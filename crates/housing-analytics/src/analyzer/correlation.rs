//! Pearson correlations within and across the two datasets.

use super::{P_VALUE_PLACES, STAT_PLACES};
use crate::error::{AnalyticsError, Result};
use crate::stats::descriptive::round_to;
use crate::stats::{pearson, Strength, ALPHA};
use housing_domain::Frame;
use serde::Serialize;
use std::collections::BTreeMap;

pub const COLUMNS: [&str; 8] = [
    "variable_1",
    "variable_2",
    "correlation",
    "p_value",
    "n_samples",
    "significant",
    "strength",
    "interpretation",
];

/// Within-pipeline pairs and the interpretation used when the correlation
/// is positive and significant.
const PIPELINE_PAIRS: [(&str, &str, &str); 2] = [
    (
        "Bottleneck_2Jaar_Pct",
        "Vergunning_Fase_Pct",
        "Bottlenecks vooral in vergunningsfase",
    ),
    (
        "Bottleneck_2Jaar_Pct",
        "Bouw_Fase_Pct",
        "Relatie tussen bottlenecks en bouwfase",
    ),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationRecord {
    pub variable_1: String,
    pub variable_2: String,
    pub correlation: f64,
    pub p_value: f64,
    pub n_samples: usize,
    pub significant: bool,
    pub strength: &'static str,
    pub interpretation: String,
}

/// Every pair that has at least 3 complete observations. Pairs that cannot
/// be computed are skipped with a warning; no pair at all is an error.
pub fn correlations(doorlooptijden: &Frame, pijplijn: &Frame) -> Result<Frame> {
    let mut records = Vec::new();

    match lead_time_vs_bottleneck(doorlooptijden, pijplijn) {
        Ok(record) => records.push(record),
        Err(e) => tracing::warn!(error = %e, "skipping cross-dataset correlation"),
    }

    for (v1, v2, hint) in PIPELINE_PAIRS {
        let (Some(a), Some(b)) = (pijplijn.column_f64(v1), pijplijn.column_f64(v2)) else {
            tracing::warn!(variable_1 = v1, variable_2 = v2, "skipping pair: column not found");
            continue;
        };
        let (x, y): (Vec<f64>, Vec<f64>) = a
            .iter()
            .zip(&b)
            .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
            .unzip();
        match record(v1, v2, &x, &y, |r, significant, strength| {
            if r > 0.0 && significant {
                hint.to_string()
            } else {
                format!("Zwakke of negatieve correlatie ({})", strength.as_str())
            }
        }) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(variable_1 = v1, variable_2 = v2, error = %e, "skipping pair"),
        }
    }

    if records.is_empty() {
        return Err(AnalyticsError::InsufficientData(
            "no correlations could be computed".to_string(),
        ));
    }
    for r in &records {
        tracing::info!(
            variable_1 = %r.variable_1,
            variable_2 = %r.variable_2,
            r = r.correlation,
            p_value = r.p_value,
            n = r.n_samples,
            "correlation"
        );
    }
    Ok(Frame::from_records(&records)?)
}

/// Mean lead time against mean 2-year bottleneck share, per region and year.
fn lead_time_vs_bottleneck(doorlooptijden: &Frame, pijplijn: &Frame) -> Result<CorrelationRecord> {
    doorlooptijden.require(&["Regio_Naam", "Jaar", "Doorlooptijd_Mediaan"], "doorlooptijden")?;
    pijplijn.require(&["Regio_Naam", "Jaar", "Bottleneck_2Jaar_Pct"], "woningen_pijplijn")?;

    let lead_times = region_year_means(doorlooptijden, "Doorlooptijd_Mediaan");
    let bottlenecks = region_year_means(pijplijn, "Bottleneck_2Jaar_Pct");
    let (x, y): (Vec<f64>, Vec<f64>) = lead_times
        .iter()
        .filter_map(|(key, lt)| bottlenecks.get(key).map(|b| (*lt, *b)))
        .unzip();

    record("Doorlooptijd_Mediaan", "Bottleneck_2Jaar_Pct", &x, &y, |r, _, _| {
        if r > 0.0 {
            "Hogere bottleneck geassocieerd met langere doorlooptijd".to_string()
        } else {
            "Hogere bottleneck geassocieerd met kortere doorlooptijd".to_string()
        }
    })
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn region_year_means(frame: &Frame, measure: &str) -> BTreeMap<(String, i64), f64> {
    let regions = frame.column_text("Regio_Naam").unwrap_or_default();
    let years = frame.column_f64("Jaar").unwrap_or_default();
    let values = frame.column_f64(measure).unwrap_or_default();

    let mut sums: BTreeMap<(String, i64), (f64, usize)> = BTreeMap::new();
    for ((region, year), value) in regions.into_iter().zip(years).zip(values) {
        if let (Some(region), Some(year), Some(value)) = (region, year, value) {
            let entry = sums.entry((region, year as i64)).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(key, (sum, n))| (key, sum / n as f64))
        .collect()
}

fn record(
    v1: &str,
    v2: &str,
    x: &[f64],
    y: &[f64],
    interpret: impl Fn(f64, bool, Strength) -> String,
) -> Result<CorrelationRecord> {
    let c = pearson(x, y)?;
    let significant = c.p_value < ALPHA;
    let strength = Strength::of(c.r);
    Ok(CorrelationRecord {
        variable_1: v1.to_string(),
        variable_2: v2.to_string(),
        correlation: round_to(c.r, STAT_PLACES),
        p_value: round_to(c.p_value, P_VALUE_PLACES),
        n_samples: c.n,
        significant,
        strength: strength.as_str(),
        interpretation: interpret(c.r, significant, strength),
    })
}
