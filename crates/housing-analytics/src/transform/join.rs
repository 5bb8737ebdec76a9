//! Dimension label joins and period decomposition.

use crate::error::Result;
use housing_domain::{Cell, DatasetDefinition, DimensionTable, Frame, PeriodCode};

/// Add every `<Dimension>_Naam` label column. A dimension without a table
/// (or with an empty one) gets an all-null label column.
pub fn attach_labels(
    frame: &mut Frame,
    definition: &DatasetDefinition,
    dimensions: &[DimensionTable],
) -> Result<()> {
    for dim in definition.dimensions {
        let codes = frame.column(dim.name).unwrap_or_default();
        let table = dimensions
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(dim.name) && !t.is_empty());

        let labels = match table {
            Some(table) => {
                let labels = table.resolve(codes);
                let unmatched = labels.iter().filter(|c| c.is_null()).count();
                if unmatched > 0 {
                    tracing::warn!(
                        dataset = definition.name,
                        dimension = dim.name,
                        unmatched,
                        "codes without a label"
                    );
                }
                tracing::info!(
                    dataset = definition.name,
                    dimension = dim.name,
                    label_column = dim.label_column,
                    "joined dimension"
                );
                labels
            }
            None => {
                tracing::warn!(
                    dataset = definition.name,
                    dimension = dim.name,
                    "dimension snapshot unavailable, label column left empty"
                );
                vec![Cell::Null; frame.height()]
            }
        };
        frame.set_column(dim.label_column, labels)?;
    }
    Ok(())
}

/// Split `Perioden` into `Jaar` and the dataset's sub-year column
/// (`Kwartaal` or `Maand`). Codes that do not parse yield nulls.
pub fn decompose_periods(frame: &mut Frame, definition: &DatasetDefinition) -> Result<()> {
    let codes = frame.column_text("Perioden").unwrap_or_default();
    let monthly = definition.period_part_column == "Maand";

    let mut years: Vec<Cell> = Vec::with_capacity(codes.len());
    let mut parts: Vec<Cell> = Vec::with_capacity(codes.len());
    for code in &codes {
        let Some(code) = code else {
            years.push(Cell::Null);
            parts.push(Cell::Null);
            continue;
        };
        years.push(PeriodCode::year_of(code).into());
        let part = PeriodCode::parse(code)
            .ok()
            .and_then(|p| if monthly { p.month() } else { p.quarter() });
        parts.push(part.into());
    }

    frame.set_column("Jaar", years)?;
    frame.set_column(definition.period_part_column, parts)?;
    Ok(())
}
