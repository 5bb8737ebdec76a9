//! Regional bottleneck ranking over the pipeline dataset.

use crate::error::Result;
use crate::stats::descriptive::round_to;
use housing_domain::{Cell, Frame};
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub const SUMMARY_COLUMNS: [&str; 7] = [
    "Rank",
    "Regio_Naam",
    "Bottleneck_2Jaar_Pct_Avg",
    "Bottleneck_5Jaar_Pct_Avg",
    "Vergunning_Fase_Pct_Avg",
    "Bouw_Fase_Pct_Avg",
    "Crisis_Regio",
];

pub const TOP10_COLUMNS: [&str; 6] = [
    "Rank",
    "Regio_Naam",
    "Bottleneck_2Jaar_Pct_Avg",
    "Bottleneck_5Jaar_Pct_Avg",
    "Vergunning_Bottleneck_Pct_Avg",
    "Interpretation",
];

const MEASURES: [&str; 4] = [
    "Bottleneck_2Jaar_Pct",
    "Bottleneck_5Jaar_Pct",
    "Vergunning_Fase_Pct",
    "Bouw_Fase_Pct",
];

#[derive(Debug, Clone, PartialEq)]
pub struct BottleneckRanking {
    pub summary: Frame,
    pub top10: Frame,
}

#[derive(Debug, Default)]
struct RegionStats {
    sums: [f64; 4],
    counts: [usize; 4],
    crisis: Option<f64>,
}

impl RegionStats {
    #[allow(clippy::cast_precision_loss)]
    fn mean(&self, i: usize) -> Option<f64> {
        (self.counts[i] > 0).then(|| round_to(self.sums[i] / self.counts[i] as f64, 2))
    }
}

/// Mean bottleneck and stage percentages per region, ranked by the 2-year
/// bottleneck share (rank 1 = worst). Regions without a 2-year value rank
/// last.
pub fn bottleneck_ranking(pijplijn: &Frame) -> Result<BottleneckRanking> {
    let mut required = MEASURES.to_vec();
    required.extend(["Regio_Naam", "Crisis_Regio"]);
    pijplijn.require(&required, "woningen_pijplijn")?;

    let regions = pijplijn.column_text("Regio_Naam").unwrap_or_default();
    let measures: Vec<Vec<Option<f64>>> = MEASURES
        .iter()
        .map(|m| pijplijn.column_f64(m).unwrap_or_default())
        .collect();
    let crisis = pijplijn.column_f64("Crisis_Regio").unwrap_or_default();

    let mut by_region: BTreeMap<String, RegionStats> = BTreeMap::new();
    for (row, region) in regions.into_iter().enumerate() {
        let Some(region) = region else { continue };
        let stats = by_region.entry(region).or_default();
        for (i, column) in measures.iter().enumerate() {
            if let Some(value) = column[row] {
                stats.sums[i] += value;
                stats.counts[i] += 1;
            }
        }
        if let Some(flag) = crisis[row] {
            stats.crisis = Some(stats.crisis.map_or(flag, |c| c.max(flag)));
        }
    }

    let mut ranked: Vec<(String, RegionStats)> = by_region.into_iter().collect();
    ranked.sort_by(|(_, a), (_, b)| match (a.mean(0), b.mean(0)) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    let mut summary = Frame::with_columns(SUMMARY_COLUMNS);
    let mut top10 = Frame::with_columns(TOP10_COLUMNS);
    for (index, (region, stats)) in ranked.iter().enumerate() {
        let rank = index + 1;
        let rank_cell = Cell::from(i64::try_from(rank).unwrap_or(i64::MAX));
        summary.push_row(vec![
            rank_cell.clone(),
            Cell::from(region.as_str()),
            Cell::from(stats.mean(0)),
            Cell::from(stats.mean(1)),
            Cell::from(stats.mean(2)),
            Cell::from(stats.mean(3)),
            Cell::from(stats.crisis),
        ])?;

        if rank <= 10 {
            top10.push_row(vec![
                rank_cell,
                Cell::from(region.as_str()),
                Cell::from(stats.mean(0)),
                Cell::from(stats.mean(1)),
                Cell::from(stats.mean(2)),
                Cell::from(interpretation(rank, stats.mean(0).unwrap_or(0.0))),
            ])?;
        }
    }

    tracing::info!(regions = summary.height(), top = top10.height(), "bottleneck ranking");
    Ok(BottleneckRanking { summary, top10 })
}

#[allow(clippy::cast_possible_truncation)]
fn interpretation(rank: usize, pct: f64) -> String {
    match rank {
        1 => {
            let one_in = (100.0 / pct.max(0.01)).round().max(1.0) as i64;
            format!("Highest bottleneck - 1 in {one_in} projecten vast >2 jaar")
        }
        2 | 3 => "Top 3 bottleneck - vergunning primary issue".to_string(),
        _ => format!("Rank {rank} - significant bottleneck ({pct:.1}% vast >2 jaar)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(rows: &[(&str, Option<f64>, f64)]) -> Frame {
        Frame::from_columns([
            ("Regio_Naam", rows.iter().map(|r| Cell::from(r.0)).collect()),
            ("Bottleneck_2Jaar_Pct", rows.iter().map(|r| Cell::from(r.1)).collect()),
            ("Bottleneck_5Jaar_Pct", rows.iter().map(|r| Cell::from(r.2)).collect()),
            ("Vergunning_Fase_Pct", rows.iter().map(|_| Cell::from(40.0)).collect()),
            ("Bouw_Fase_Pct", rows.iter().map(|_| Cell::from(60.0)).collect()),
            (
                "Crisis_Regio",
                rows.iter()
                    .map(|r| Cell::from(r.1.map(|v| i64::from(v > 30.0))))
                    .collect(),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_ranking_and_interpretations() {
        let frame = pipeline(&[
            ("Utrecht", Some(20.0), 4.0),
            ("Amsterdam", Some(40.0), 10.0),
            ("Amsterdam", Some(30.0), 8.0),
            ("Zwolle", Some(10.0), 1.0),
            ("Almere", None, 2.0),
            ("Breda", Some(5.0), 0.5),
        ]);
        let result = bottleneck_ranking(&frame).unwrap();

        let names = result.summary.column_text("Regio_Naam").unwrap();
        assert_eq!(
            names,
            vec![
                Some("Amsterdam".to_string()),
                Some("Utrecht".to_string()),
                Some("Zwolle".to_string()),
                Some("Breda".to_string()),
                Some("Almere".to_string()),
            ]
        );
        assert_eq!(result.summary.cell(0, "Bottleneck_2Jaar_Pct_Avg"), Some(&Cell::Float(35.0)));
        assert_eq!(result.summary.cell(0, "Crisis_Regio"), Some(&Cell::Float(1.0)));
        assert_eq!(result.summary.cell(4, "Bottleneck_2Jaar_Pct_Avg"), Some(&Cell::Null));

        assert_eq!(
            result.top10.cell(0, "Interpretation"),
            Some(&Cell::from("Highest bottleneck - 1 in 3 projecten vast >2 jaar"))
        );
        assert_eq!(
            result.top10.cell(1, "Interpretation"),
            Some(&Cell::from("Top 3 bottleneck - vergunning primary issue"))
        );
        assert_eq!(
            result.top10.cell(3, "Interpretation"),
            Some(&Cell::from("Rank 4 - significant bottleneck (5.0% vast >2 jaar)"))
        );
        assert_eq!(result.top10.cell(0, "Vergunning_Bottleneck_Pct_Avg"), Some(&Cell::Float(40.0)));
    }

    #[test]
    fn test_top10_caps_rows() {
        let names: Vec<String> = (0..12).map(|i| format!("Gemeente {i:02}")).collect();
        let rows: Vec<(&str, Option<f64>, f64)> = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_str(), Some(f64::from(u32::try_from(i).unwrap())), 1.0))
            .collect();
        let result = bottleneck_ranking(&pipeline(&rows)).unwrap();

        assert_eq!(result.summary.height(), 12);
        assert_eq!(result.top10.height(), 10);
        assert_eq!(result.top10.cell(9, "Rank"), Some(&Cell::Int(10)));
    }
}
