//! Single-family versus multi-family lead time.

use super::{labelled_values, stat, P_VALUE_PLACES, STAT_PLACES};
use crate::error::{AnalyticsError, Result};
use crate::stats::{effect_size_label, welch_t_test, ALPHA};
use housing_domain::{Cell, Frame};

/// Label of the all-types aggregate row
const TOTAL_LABEL: &str = "Totaal";

pub const COLUMNS: [&str; 11] = [
    "woningtype_1",
    "woningtype_2",
    "mean_1",
    "mean_2",
    "mean_diff",
    "t_statistic",
    "p_value",
    "significant",
    "cohens_d",
    "effect_size",
    "interpretation",
];

/// Welch t-test of `Eengezins*` against `Meergezins*` housing types. The
/// aggregate `Totaal` row is excluded; subtype totals stay in their group.
pub fn woningtype_comparison(doorlooptijden: &Frame) -> Result<Frame> {
    doorlooptijden.require(&["Woningtype_Naam", "Doorlooptijd_Mediaan"], "doorlooptijden")?;

    let mut single = Vec::new();
    let mut multi = Vec::new();
    for (label, value) in labelled_values(doorlooptijden, "Woningtype_Naam", "Doorlooptijd_Mediaan") {
        if label.trim() == TOTAL_LABEL {
            continue;
        }
        let label = label.to_lowercase();
        if label.contains("eengezins") {
            single.push(value);
        } else if label.contains("meergezins") {
            multi.push(value);
        }
    }
    if single.len() < 2 || multi.len() < 2 {
        return Err(AnalyticsError::InsufficientData(format!(
            "not enough samples for t-test: Eengezins n={}, Meergezins n={}",
            single.len(),
            multi.len()
        )));
    }

    let test = welch_t_test(&single, &multi)?;
    let significant = test.p_value < ALPHA;
    let effect = format!("{} effect size", effect_size_label(test.cohens_d));
    tracing::info!(
        t_statistic = %format_args!("{:.4}", test.t_statistic),
        p_value = %format_args!("{:.6}", test.p_value),
        mean_eengezins = %format_args!("{:.2}", test.mean_1),
        mean_meergezins = %format_args!("{:.2}", test.mean_2),
        cohens_d = %format_args!("{:.4}", test.cohens_d),
        "woningtype t-test"
    );

    let interpretation = if significant {
        let longer = if test.mean_2 > test.mean_1 { "Meergezins" } else { "Eengezins" };
        format!("{longer} significant langer ({effect})")
    } else {
        format!("Geen significant verschil ({effect})")
    };

    let mut table = Frame::with_columns(COLUMNS);
    table.push_row(vec![
        Cell::from("Eengezinswoning"),
        Cell::from("Meergezinswoning"),
        stat(test.mean_1, STAT_PLACES),
        stat(test.mean_2, STAT_PLACES),
        stat(test.mean_diff, STAT_PLACES),
        stat(test.t_statistic, STAT_PLACES),
        stat(test.p_value, P_VALUE_PLACES),
        Cell::from(significant),
        stat(test.cohens_d, STAT_PLACES),
        Cell::from(effect_size_label(test.cohens_d)),
        Cell::from(interpretation),
    ])?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(rows: &[(&str, f64)]) -> Frame {
        Frame::from_columns([
            ("Woningtype_Naam", rows.iter().map(|(t, _)| Cell::from(*t)).collect()),
            ("Doorlooptijd_Mediaan", rows.iter().map(|(_, v)| Cell::from(*v)).collect()),
        ])
        .unwrap()
    }

    #[test]
    fn test_multi_family_longer() {
        let input = frame(&[
            ("Eengezinswoning", 14.0),
            ("Eengezinswoning", 15.0),
            ("Eengezinswoning", 13.5),
            ("Meergezinswoning", 22.0),
            ("Meergezinswoning", 23.5),
            ("Meergezinswoning", 21.0),
            ("Totaal", 100.0),
            (" Totaal ", 100.0),
            ("Totaal woningen", 100.0),
        ]);
        let table = woningtype_comparison(&input).unwrap();

        assert_eq!(table.cell(0, "significant"), Some(&Cell::Bool(true)));
        assert_eq!(table.cell(0, "effect_size"), Some(&Cell::from("large")));
        assert_eq!(
            table.cell(0, "interpretation"),
            Some(&Cell::from("Meergezins significant langer (large effect size)"))
        );
        assert_eq!(table.cell(0, "mean_1"), Some(&Cell::Float(14.1667)));
    }

    #[test]
    fn test_subtype_total_stays_in_group() {
        let input = frame(&[
            ("Eengezinswoning", 10.0),
            ("Eengezinswoning, totaal", 20.0),
            ("Meergezinswoning", 30.0),
            ("Meergezinswoning", 31.0),
            ("Totaal", 500.0),
        ]);
        let table = woningtype_comparison(&input).unwrap();
        assert_eq!(table.cell(0, "mean_1"), Some(&Cell::Float(15.0)));
        assert_eq!(table.cell(0, "mean_2"), Some(&Cell::Float(30.5)));
    }

    #[test]
    fn test_zero_variance_groups() {
        let input = frame(&[
            ("Eengezinswoning", 12.0),
            ("Eengezinswoning", 12.0),
            ("Meergezinswoning", 18.0),
            ("Meergezinswoning", 18.0),
        ]);
        let table = woningtype_comparison(&input).unwrap();
        assert_eq!(table.cell(0, "significant"), Some(&Cell::Bool(true)));
        assert_eq!(table.cell(0, "effect_size"), Some(&Cell::from("large")));
    }

    #[test]
    fn test_too_few_samples() {
        let input = frame(&[("Eengezinswoning", 12.0), ("Meergezinswoning", 18.0)]);
        assert!(matches!(
            woningtype_comparison(&input),
            Err(AnalyticsError::InsufficientData(_))
        ));
    }
}
