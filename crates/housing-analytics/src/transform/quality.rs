//! Soft data-quality checks. Findings are logged, never enforced.

use crate::stats::descriptive::{quantile_sorted, sorted_finite};
use housing_domain::{Frame, QualityRules};

/// What the checks found for one processed table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityReport {
    /// Share of null cells across the table
    pub null_fraction: f64,
    pub year_range: Option<(i32, i32)>,
    /// Per measure: count of values outside the IQR fence
    pub outliers: Vec<(String, usize)>,
    pub warnings: Vec<String>,
}

impl QualityReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Run null, year-range and outlier checks over `measures`.
pub fn inspect(dataset: &str, frame: &Frame, measures: &[&str], rules: &QualityRules) -> QualityReport {
    let mut report = QualityReport {
        null_fraction: frame.null_fraction(),
        ..QualityReport::default()
    };

    tracing::info!(
        dataset,
        null_pct = %format_args!("{:.2}", report.null_fraction * 100.0),
        "null values across all cells"
    );
    if report.null_fraction > rules.max_null_fraction {
        tracing::warn!(
            dataset,
            null_pct = %format_args!("{:.2}", report.null_fraction * 100.0),
            threshold_pct = %format_args!("{:.2}", rules.max_null_fraction * 100.0),
            "high null percentage"
        );
        report.warnings.push(format!(
            "null percentage {:.2}% exceeds {:.2}%",
            report.null_fraction * 100.0,
            rules.max_null_fraction * 100.0
        ));
    }

    let years: Vec<i32> = frame
        .column("Jaar")
        .map(|cells| {
            cells
                .iter()
                .filter_map(|c| c.as_i64())
                .filter_map(|y| i32::try_from(y).ok())
                .collect()
        })
        .unwrap_or_default();
    if let (Some(&min), Some(&max)) = (years.iter().min(), years.iter().max()) {
        report.year_range = Some((min, max));
        tracing::info!(dataset, min_year = min, max_year = max, "year range");
        if min < rules.min_year {
            tracing::warn!(dataset, min_year = min, bound = rules.min_year, "years before allowed range");
            report
                .warnings
                .push(format!("data contains years before {}", rules.min_year));
        }
        if max > rules.max_year {
            tracing::warn!(dataset, max_year = max, bound = rules.max_year, "years after allowed range");
            report
                .warnings
                .push(format!("data contains years after {}", rules.max_year));
        }
    }

    for &measure in measures {
        let Some(values) = frame.column_f64(measure) else {
            continue;
        };
        let sorted = sorted_finite(values.iter().flatten().copied());
        let (Some(q1), Some(q3)) = (quantile_sorted(&sorted, 0.25), quantile_sorted(&sorted, 0.75))
        else {
            continue;
        };
        let iqr = q3 - q1;
        let lower = rules.outlier_fence.mul_add(-iqr, q1);
        let upper = rules.outlier_fence.mul_add(iqr, q3);
        let count = sorted.iter().filter(|v| **v < lower || **v > upper).count();
        if count > 0 {
            tracing::info!(
                dataset,
                measure,
                outliers = count,
                lower = %format_args!("{lower:.1}"),
                upper = %format_args!("{upper:.1}"),
                "potential outliers"
            );
        }
        report.outliers.push((measure.to_string(), count));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use housing_domain::Cell;

    #[test]
    fn test_outliers_counted_not_removed() {
        let mut values: Vec<Cell> = (0..20).map(|i| Cell::from(10.0 + f64::from(i % 3))).collect();
        values.push(Cell::from(500.0));
        let years = vec![Cell::from(2020); values.len()];
        let frame = Frame::from_columns([("Doorlooptijd_Mediaan", values), ("Jaar", years)]).unwrap();

        let report = inspect("doorlooptijden", &frame, &["Doorlooptijd_Mediaan"], &QualityRules::default());

        assert_eq!(report.outliers, vec![("Doorlooptijd_Mediaan".to_string(), 1)]);
        assert_eq!(report.year_range, Some((2020, 2020)));
        assert!(report.is_clean());
        assert_eq!(frame.height(), 21);
    }

    #[test]
    fn test_null_and_year_warnings() {
        let frame = Frame::from_columns([
            ("Jaar", vec![Cell::from(2010), Cell::from(2030)]),
            ("Doorlooptijd_Mediaan", vec![Cell::Null, Cell::Null]),
        ])
        .unwrap();

        let report = inspect("doorlooptijden", &frame, &["Doorlooptijd_Mediaan"], &QualityRules::default());

        assert!((report.null_fraction - 0.5).abs() < 1e-12);
        assert_eq!(report.warnings.len(), 3);
        assert!(report.outliers.is_empty());
    }
}
