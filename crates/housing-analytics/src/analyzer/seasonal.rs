//! Seasonal-trend decomposition of the lead-time (quarterly) and pipeline
//! (monthly) series.

use crate::error::{AnalyticsError, Result};
use crate::stats::descriptive::round_to;
use crate::stats::Stl;
use housing_domain::{Cell, Frame, Granularity, PeriodCode};
use std::collections::BTreeMap;

/// How one dataset is turned into a national time series
#[derive(Debug, Clone, Copy)]
pub struct SeriesSpec {
    pub dataset: &'static str,
    pub measure: &'static str,
    /// `Kwartaal` or `Maand`
    pub part_column: &'static str,
    pub granularity: Granularity,
    pub places: i32,
}

pub const DOORLOOPTIJD_SERIES: SeriesSpec = SeriesSpec {
    dataset: "doorlooptijden",
    measure: "Doorlooptijd_Mediaan",
    part_column: "Kwartaal",
    granularity: Granularity::Quarter,
    places: 4,
};

pub const PIJPLIJN_SERIES: SeriesSpec = SeriesSpec {
    dataset: "woningen_pijplijn",
    measure: "Pijplijn_Totaal",
    part_column: "Maand",
    granularity: Granularity::Month,
    places: 2,
};

#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalDecomposition {
    pub doorlooptijd: Frame,
    pub pijplijn: Frame,
}

#[derive(Debug)]
struct Slot {
    sum: f64,
    count: usize,
    label: Option<String>,
}

pub fn seasonal_decomposition(doorlooptijden: &Frame, pijplijn: &Frame) -> Result<SeasonalDecomposition> {
    Ok(SeasonalDecomposition {
        doorlooptijd: decompose(doorlooptijden, &DOORLOOPTIJD_SERIES)?,
        pijplijn: decompose(pijplijn, &PIJPLIJN_SERIES)?,
    })
}

/// Mean of `shape.measure` per period on a gap-free grid, decomposed with a
/// robust STL when the series is long enough. Shorter series keep their
/// observed values with null components.
pub fn decompose(frame: &Frame, shape: &SeriesSpec) -> Result<Frame> {
    frame.require(&["Jaar", shape.part_column, shape.measure], shape.dataset)?;

    let series = period_grid(frame, shape);
    if series.is_empty() {
        return Err(AnalyticsError::InsufficientData(format!(
            "no {} observations for seasonal decomposition of {}",
            shape.measure, shape.dataset
        )));
    }

    let period = shape.granularity.periods_per_year() as usize;
    let stl = Stl::new(period)?.robust();
    let observed: Vec<f64> = series.iter().map(|(_, _, v)| *v).collect();
    let components = if observed.len() >= stl.min_observations() {
        Some(stl.fit(&observed)?)
    } else {
        tracing::warn!(
            dataset = shape.dataset,
            observations = observed.len(),
            required = stl.min_observations(),
            "series too short for seasonal decomposition, components left empty"
        );
        None
    };

    let component = |values: Option<&Vec<f64>>, i: usize| {
        values.map_or(Cell::Null, |v| Cell::from(round_to(v[i], shape.places)))
    };
    let mut table = Frame::with_columns([
        "Jaar",
        shape.part_column,
        "Periode_Naam",
        "Observed",
        "Trend",
        "Seasonal",
        "Residual",
    ]);
    for (i, (code, label, value)) in series.iter().enumerate() {
        table.push_row(vec![
            Cell::from(code.year),
            Cell::from(code.index),
            Cell::from(label.as_str()),
            Cell::from(round_to(*value, shape.places)),
            component(components.as_ref().map(|c| &c.trend), i),
            component(components.as_ref().map(|c| &c.seasonal), i),
            component(components.as_ref().map(|c| &c.residual), i),
        ])?;
    }

    tracing::info!(
        dataset = shape.dataset,
        periods = table.height(),
        decomposed = components.is_some(),
        "seasonal decomposition"
    );
    Ok(table)
}

/// `(period, label, mean)` for every period from the first to the last
/// observed one. Missing periods carry the previous mean forward and are
/// labelled with their code.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn period_grid(frame: &Frame, shape: &SeriesSpec) -> Vec<(PeriodCode, String, f64)> {
    let years = frame.column_f64("Jaar").unwrap_or_default();
    let parts = frame.column_f64(shape.part_column).unwrap_or_default();
    let values = frame.column_f64(shape.measure).unwrap_or_default();
    let labels = frame
        .column_text("Periode_Naam")
        .unwrap_or_else(|| vec![None; frame.height()]);
    let last_index = shape.granularity.periods_per_year();

    let mut slots: BTreeMap<PeriodCode, Slot> = BTreeMap::new();
    for row in 0..frame.height() {
        let (Some(year), Some(part), Some(value)) = (years[row], parts[row], values[row]) else {
            continue;
        };
        let index = part as u32;
        if index < 1 || index > last_index {
            continue;
        }
        let code = PeriodCode::new(year as i32, shape.granularity, index);
        let slot = slots.entry(code).or_insert(Slot {
            sum: 0.0,
            count: 0,
            label: None,
        });
        slot.sum += value;
        slot.count += 1;
        if slot.label.is_none() {
            slot.label.clone_from(&labels[row]);
        }
    }

    let (Some(first), Some(last)) = (
        slots.keys().next().copied(),
        slots.keys().next_back().copied(),
    ) else {
        return Vec::new();
    };

    let mut series = Vec::new();
    let mut previous = 0.0;
    let mut code = first;
    while code <= last {
        match slots.get(&code) {
            Some(slot) => {
                previous = slot.sum / slot.count as f64;
                let label = slot.label.clone().unwrap_or_else(|| code.to_string());
                series.push((code, label, previous));
            }
            None => series.push((code, code.to_string(), previous)),
        }
        code = code.next();
    }
    series
}
