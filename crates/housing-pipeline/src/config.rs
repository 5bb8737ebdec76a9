//! # Pipeline Configuration
//!
//! Environment-based configuration, built once in `main` and handed to each
//! component. Every variable has a default; values that fail to parse fall
//! back to the default. [`Config::validate`] rejects combinations the
//! pipeline cannot run with.

use anyhow::{Context, ensure};
use housing_domain::dataset::{DOORLOOPTIJDEN, WONINGEN_PIJPLIJN};
use housing_domain::{DatasetDefinition, DatasetDescriptor, Granularity, QualityRules};
use housing_extract::ApiConfig;
use std::env;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound on `CBS_MAX_RETRIES`
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// CBS OData connection and retry settings
    pub api: ApiConfig,

    /// Extraction window and granularities
    pub extraction: ExtractionSettings,

    /// Root of `raw/`, `processed/` and the manifest
    pub data_dir: PathBuf,

    /// Analysis output directory
    pub results_dir: PathBuf,

    /// DuckDB database file
    pub db_path: PathBuf,

    /// Directory holding the versioned DDL
    pub sql_schema_dir: PathBuf,

    /// Number of raw extractions kept by retention
    pub keep_last_extractions: usize,

    /// Soft data-quality thresholds
    pub quality: QualityRules,

    /// Fallback log filter when `RUST_LOG` is unset
    pub log_level: String,
}

/// Year range and period granularity per dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionSettings {
    pub start_year: i32,
    pub end_year: i32,
    pub doorlooptijd_granularity: String,
    pub pijplijn_granularity: String,
}

impl ExtractionSettings {
    /// Bind both catalog tables to the configured window.
    pub fn descriptors(&self) -> anyhow::Result<Vec<DatasetDescriptor>> {
        let doorlooptijd = granularity_for(
            &DOORLOOPTIJDEN,
            "DOORLOOPTIJD_GRANULARITY",
            &self.doorlooptijd_granularity,
        )?;
        let pijplijn = granularity_for(
            &WONINGEN_PIJPLIJN,
            "PIJPLIJN_GRANULARITY",
            &self.pijplijn_granularity,
        )?;

        Ok(vec![
            DatasetDescriptor::new(&DOORLOOPTIJDEN, self.start_year, self.end_year, doorlooptijd),
            DatasetDescriptor::new(&WONINGEN_PIJPLIJN, self.start_year, self.end_year, pijplijn),
        ])
    }
}

impl Config {
    /// Load configuration from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_defaults = ApiConfig::default();
        let quality_defaults = QualityRules::default();

        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let path = |key: &str, default: &str| PathBuf::from(text(key, default));

        Self {
            api: ApiConfig {
                base_url: text("CBS_API_BASE_URL", &api_defaults.base_url),
                timeout: Duration::from_secs(parse_or(&lookup, "CBS_TIMEOUT_SECS", 60)),
                max_retries: parse_or(&lookup, "CBS_MAX_RETRIES", api_defaults.max_retries),
                page_size: parse_or(&lookup, "CBS_PAGE_SIZE", api_defaults.page_size),
                retry_base: parse_or(&lookup, "CBS_RETRY_BASE", api_defaults.retry_base),
                rate_limit_delay: Duration::from_secs(parse_or(
                    &lookup,
                    "CBS_RATE_LIMIT_DELAY_SECS",
                    10,
                )),
            },

            extraction: ExtractionSettings {
                start_year: parse_or(&lookup, "EXTRACTION_START_YEAR", 2015),
                end_year: parse_or(&lookup, "EXTRACTION_END_YEAR", 2024),
                doorlooptijd_granularity: text("DOORLOOPTIJD_GRANULARITY", "quarter"),
                pijplijn_granularity: text("PIJPLIJN_GRANULARITY", "month"),
            },

            data_dir: path("DATA_DIR", "data"),
            results_dir: path("RESULTS_DIR", "results"),
            db_path: path("DB_PATH", "data/housing.duckdb"),
            sql_schema_dir: path("SQL_SCHEMA_DIR", "sql/schema"),

            keep_last_extractions: parse_or(&lookup, "KEEP_LAST_EXTRACTIONS", 1),

            quality: QualityRules {
                max_null_fraction: parse_or(
                    &lookup,
                    "MAX_NULL_PERCENTAGE",
                    quality_defaults.max_null_fraction,
                ),
                min_year: parse_or(&lookup, "MIN_YEAR", quality_defaults.min_year),
                max_year: parse_or(&lookup, "MAX_YEAR", quality_defaults.max_year),
                ..quality_defaults
            },

            log_level: text("LOG_LEVEL", "info"),
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        let ex = &self.extraction;
        ensure!(
            ex.start_year <= ex.end_year,
            "EXTRACTION_START_YEAR ({}) is after EXTRACTION_END_YEAR ({})",
            ex.start_year,
            ex.end_year
        );
        for year in [ex.start_year, ex.end_year] {
            ensure!(
                self.quality.year_in_range(year),
                "extraction year {year} outside [{}, {}]",
                self.quality.min_year,
                self.quality.max_year
            );
        }
        ex.descriptors()?;

        ensure!(
            self.api.base_url.starts_with("https://"),
            "CBS_API_BASE_URL must use https: {}",
            self.api.base_url
        );
        ensure!(self.api.page_size > 0, "CBS_PAGE_SIZE must be positive");
        ensure!(
            self.api.retry_base.is_finite() && self.api.retry_base >= 1.0,
            "CBS_RETRY_BASE must be a finite number of at least 1, got {}",
            self.api.retry_base
        );
        ensure!(
            self.api.max_retries <= MAX_RETRIES_LIMIT,
            "CBS_MAX_RETRIES must be at most {MAX_RETRIES_LIMIT}, got {}",
            self.api.max_retries
        );
        ensure!(
            (0.0..=1.0).contains(&self.quality.max_null_fraction),
            "MAX_NULL_PERCENTAGE must be a fraction between 0 and 1"
        );
        Ok(())
    }

    /// Human-readable view of the effective configuration.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "API");
        let _ = writeln!(out, "  base url          {}", self.api.base_url);
        let _ = writeln!(out, "  timeout           {}s", self.api.timeout.as_secs());
        let _ = writeln!(
            out,
            "  retries           {} (base {}s, 429 cooldown {}s)",
            self.api.max_retries,
            self.api.retry_base,
            self.api.rate_limit_delay.as_secs()
        );
        let _ = writeln!(out, "  page size         {}", self.api.page_size);
        let _ = writeln!(out, "Extraction");
        let _ = writeln!(
            out,
            "  years             {}-{}",
            self.extraction.start_year, self.extraction.end_year
        );
        let _ = writeln!(
            out,
            "  granularity       doorlooptijden={} woningen_pijplijn={}",
            self.extraction.doorlooptijd_granularity, self.extraction.pijplijn_granularity
        );
        let _ = writeln!(out, "  keep extractions  {}", self.keep_last_extractions);
        let _ = writeln!(out, "Quality");
        let _ = writeln!(
            out,
            "  max nulls         {:.1}%",
            self.quality.max_null_fraction * 100.0
        );
        let _ = writeln!(
            out,
            "  years             {}-{}",
            self.quality.min_year, self.quality.max_year
        );
        let _ = writeln!(out, "Paths");
        let _ = writeln!(out, "  data              {}", self.data_dir.display());
        let _ = writeln!(out, "  results           {}", self.results_dir.display());
        let _ = writeln!(out, "  database          {}", self.db_path.display());
        let _ = writeln!(out, "  sql schema        {}", self.sql_schema_dir.display());
        let _ = write!(out, "Log level           {}", self.log_level);
        out
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn granularity_for(
    definition: &DatasetDefinition,
    key: &str,
    raw: &str,
) -> anyhow::Result<Granularity> {
    let granularity = Granularity::from_str(raw).context(key.to_string())?;
    ensure!(
        definition.supports(granularity),
        "{key}={granularity:?} is not supported for {}; only {:?} can be processed",
        definition.name,
        definition.default_granularity
    );
    Ok(granularity)
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "unparseable setting, using default");
            default
        }),
        None => default,
    }
}
