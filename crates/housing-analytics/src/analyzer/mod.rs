//! The six statistical analyses and the runner that writes their result
//! tables.

pub mod bottleneck;
pub mod correlation;
pub mod regional;
pub mod seasonal;
pub mod temporal;
pub mod woningtype;

use crate::error::{AnalyticsError, Result};
use crate::stats::descriptive::round_to;
use housing_domain::{Cell, Frame};
use housing_persistence::{write_frame, ManifestStore, SnapshotFormat, SnapshotStore};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub use bottleneck::{bottleneck_ranking, BottleneckRanking};
pub use correlation::correlations;
pub use regional::{regional_anova, RegionalAnova};
pub use seasonal::{seasonal_decomposition, SeasonalDecomposition};
pub use temporal::temporal_trend;
pub use woningtype::woningtype_comparison;

pub(crate) const STAT_PLACES: i32 = 4;
pub(crate) const P_VALUE_PLACES: i32 = 6;

pub(crate) fn stat(value: f64, places: i32) -> Cell {
    Cell::from(round_to(value, places))
}

/// Non-null `(label, value)` pairs from two columns.
pub(crate) fn labelled_values(frame: &Frame, label: &str, value: &str) -> Vec<(String, f64)> {
    let labels = frame.column_text(label).unwrap_or_default();
    let values = frame.column_f64(value).unwrap_or_default();
    labels
        .into_iter()
        .zip(values)
        .filter_map(|(l, v)| Some((l?, v?)))
        .collect()
}

// =============================================================================
// ANALYSIS SELECTION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Analysis {
    TemporalTrend,
    RegionalAnova,
    Bottlenecks,
    WoningtypeComparison,
    Correlations,
    SeasonalDecomposition,
}

impl Analysis {
    /// Execution order of a full run
    pub const ALL: [Self; 6] = [
        Self::TemporalTrend,
        Self::RegionalAnova,
        Self::Bottlenecks,
        Self::WoningtypeComparison,
        Self::Correlations,
        Self::SeasonalDecomposition,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TemporalTrend => "temporal",
            Self::RegionalAnova => "regional",
            Self::Bottlenecks => "bottleneck",
            Self::WoningtypeComparison => "woningtype",
            Self::Correlations => "correlation",
            Self::SeasonalDecomposition => "seasonal",
        }
    }
}

impl fmt::Display for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Analysis {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|a| a.name()).collect();
                AnalyticsError::InvalidParameter(format!(
                    "unknown analysis '{s}', expected one of: {}",
                    known.join(", ")
                ))
            })
    }
}

// =============================================================================
// RUNNER
// =============================================================================

/// Both processed datasets plus the directory results are written to
#[derive(Debug, Clone)]
pub struct Analyzer {
    doorlooptijden: Frame,
    pijplijn: Frame,
    results_dir: PathBuf,
}

impl Analyzer {
    pub fn new(doorlooptijden: Frame, pijplijn: Frame, results_dir: impl Into<PathBuf>) -> Self {
        Self {
            doorlooptijden,
            pijplijn,
            results_dir: results_dir.into(),
        }
    }

    /// Load the current processed snapshot of both datasets.
    pub fn load(
        store: &SnapshotStore,
        manifest: &ManifestStore,
        results_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let read = |dataset: &str| -> Result<Frame> {
            let path = manifest.latest_processed(dataset).map_err(AnalyticsError::from_read)?;
            let frame = store.read(&path).map_err(AnalyticsError::from_read)?;
            tracing::info!(
                dataset,
                path = %path.display(),
                rows = frame.height(),
                columns = frame.width(),
                "loaded processed snapshot"
            );
            Ok(frame)
        };
        Ok(Self::new(
            read("doorlooptijden")?,
            read("woningen_pijplijn")?,
            results_dir,
        ))
    }

    #[must_use]
    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Run every analysis in order, stopping at the first failure.
    pub fn run_all(&self) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for analysis in Analysis::ALL {
            written.extend(self.run(analysis)?);
        }
        tracing::info!(files = written.len(), dir = %self.results_dir.display(), "analysis complete");
        Ok(written)
    }

    /// Run one analysis and write its result tables as CSV.
    pub fn run(&self, analysis: Analysis) -> Result<Vec<PathBuf>> {
        tracing::info!(analysis = %analysis, "running analysis");
        let tables: Vec<(&str, Frame)> = match analysis {
            Analysis::TemporalTrend => vec![(
                "1_temporal_regression.csv",
                temporal_trend(&self.doorlooptijden)?,
            )],
            Analysis::RegionalAnova => {
                let result = regional_anova(&self.doorlooptijden)?;
                vec![
                    ("2_regional_anova.csv", result.summary),
                    ("2_regional_anova_posthoc.csv", result.posthoc),
                ]
            }
            Analysis::Bottlenecks => {
                let result = bottleneck_ranking(&self.pijplijn)?;
                vec![
                    ("3_bottleneck_summary.csv", result.summary),
                    ("3_bottleneck_top10_crisis.csv", result.top10),
                ]
            }
            Analysis::WoningtypeComparison => vec![(
                "4_woningtype_ttest.csv",
                woningtype_comparison(&self.doorlooptijden)?,
            )],
            Analysis::Correlations => vec![(
                "5_correlation_matrix.csv",
                correlations(&self.doorlooptijden, &self.pijplijn)?,
            )],
            Analysis::SeasonalDecomposition => {
                let result = seasonal_decomposition(&self.doorlooptijden, &self.pijplijn)?;
                vec![
                    ("6_seasonal_decomposition_doorlooptijd.csv", result.doorlooptijd),
                    ("6_seasonal_decomposition_pijplijn.csv", result.pijplijn),
                ]
            }
        };

        std::fs::create_dir_all(&self.results_dir)?;
        let mut written = Vec::with_capacity(tables.len());
        for (file_name, table) in tables {
            let path = self.results_dir.join(file_name);
            write_frame(&path, &table, SnapshotFormat::Csv)?;
            tracing::info!(path = %path.display(), rows = table.height(), "wrote result");
            written.push(path);
        }
        Ok(written)
    }
}
