//! Regional differences in lead time: one-way ANOVA and Tukey HSD.

use super::{labelled_values, stat, P_VALUE_PLACES, STAT_PLACES};
use crate::error::{AnalyticsError, Result};
use crate::stats::{one_way_anova, tukey_hsd, ALPHA};
use housing_domain::{Cell, Frame};
use std::collections::BTreeMap;

pub const SUMMARY_COLUMNS: [&str; 7] = [
    "test",
    "f_statistic",
    "p_value",
    "significant",
    "eta_squared",
    "n_groups",
    "interpretation",
];

pub const POSTHOC_COLUMNS: [&str; 8] = [
    "group1",
    "group2",
    "mean_diff",
    "p_adj",
    "lower",
    "upper",
    "significant",
    "interpretation",
];

#[derive(Debug, Clone, PartialEq)]
pub struct RegionalAnova {
    pub summary: Frame,
    /// Significant pairs only
    pub posthoc: Frame,
}

/// Regions with fewer than 2 observations are left out of both tests.
pub fn regional_anova(doorlooptijden: &Frame) -> Result<RegionalAnova> {
    doorlooptijden.require(&["Regio_Naam", "Doorlooptijd_Mediaan"], "doorlooptijden")?;

    let mut by_region: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (region, value) in labelled_values(doorlooptijden, "Regio_Naam", "Doorlooptijd_Mediaan") {
        by_region.entry(region).or_default().push(value);
    }
    let groups: Vec<(String, Vec<f64>)> = by_region
        .into_iter()
        .filter(|(_, values)| values.len() >= 2)
        .collect();
    if groups.len() < 2 {
        return Err(AnalyticsError::InsufficientData(format!(
            "need at least 2 regions with 2 or more observations for ANOVA, got {}",
            groups.len()
        )));
    }

    let values: Vec<Vec<f64>> = groups.iter().map(|(_, v)| v.clone()).collect();
    let anova = one_way_anova(&values)?;
    let significant = anova.p_value < ALPHA;
    tracing::info!(
        f_statistic = %format_args!("{:.4}", anova.f_statistic),
        p_value = %format_args!("{:.6}", anova.p_value),
        eta_squared = %format_args!("{:.4}", anova.eta_squared),
        groups = groups.len(),
        "regional ANOVA"
    );

    let interpretation = if significant {
        format!(
            "Significant regional differences ({:.1}% variance explained)",
            anova.eta_squared * 100.0
        )
    } else {
        "No significant regional differences".to_string()
    };

    let mut summary = Frame::with_columns(SUMMARY_COLUMNS);
    summary.push_row(vec![
        Cell::from("one_way_anova"),
        stat(anova.f_statistic, STAT_PLACES),
        stat(anova.p_value, P_VALUE_PLACES),
        Cell::from(significant),
        stat(anova.eta_squared, STAT_PLACES),
        Cell::from(i64::try_from(groups.len()).unwrap_or(i64::MAX)),
        Cell::from(interpretation),
    ])?;

    let pairs = tukey_hsd(&groups, ALPHA)?;
    let mut posthoc = Frame::with_columns(POSTHOC_COLUMNS);
    for pair in pairs.iter().filter(|p| p.reject) {
        let longer = if pair.mean_diff > 0.0 { &pair.group2 } else { &pair.group1 };
        posthoc.push_row(vec![
            Cell::from(pair.group1.as_str()),
            Cell::from(pair.group2.as_str()),
            stat(pair.mean_diff, STAT_PLACES),
            stat(pair.p_adj, STAT_PLACES),
            stat(pair.lower, STAT_PLACES),
            stat(pair.upper, STAT_PLACES),
            Cell::from(true),
            Cell::from(format!("{longer} {:.1} maanden langer", pair.mean_diff.abs())),
        ])?;
    }
    tracing::info!(
        pairs = pairs.len(),
        significant_pairs = posthoc.height(),
        "Tukey HSD post-hoc"
    );

    Ok(RegionalAnova { summary, posthoc })
}
