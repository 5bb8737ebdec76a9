//! Pipeline steps behind the CLI subcommands.
//!
//! Each step reads what the previous one recorded in the manifest, so the
//! steps can run on their own or chained by [`Pipeline::run`].

use crate::config::Config;
use anyhow::Context;
use housing_analytics::{Analysis, Analyzer, LoadSummary, SqlLoader, TransformSummary, Transformer};
use housing_domain::dataset::CATALOG;
use housing_extract::{CbsClient, ExtractionSummary, Extractor};
use housing_persistence::{ManifestStore, PruneReport, SnapshotStore, prune_extractions};
use std::path::PathBuf;

/// Snapshot store and manifest opened over the configured data directory
pub struct Pipeline<'a> {
    config: &'a Config,
    store: SnapshotStore,
    manifest: ManifestStore,
}

impl<'a> Pipeline<'a> {
    pub fn open(config: &'a Config) -> anyhow::Result<Self> {
        let store = SnapshotStore::open(config.data_dir.clone())
            .with_context(|| format!("opening data directory {}", config.data_dir.display()))?;
        let manifest = ManifestStore::in_dir(&config.data_dir);
        Ok(Self {
            config,
            store,
            manifest,
        })
    }

    /// Fetch both datasets, then prune old extractions.
    pub fn extract(&self, max_rows: Option<usize>) -> anyhow::Result<ExtractionSummary> {
        let descriptors = self.config.extraction.descriptors()?;
        let client = CbsClient::new(self.config.api.clone()).context("building CBS client")?;

        let summary = Extractor::new(&client, &self.store, &self.manifest)
            .with_max_rows(max_rows)
            .run(&descriptors)
            .context("extraction failed")?;

        for dataset in &summary.datasets {
            tracing::info!(
                dataset = %dataset.dataset,
                fact_rows = dataset.fact_rows,
                dimensions = dataset.dimensions.len(),
                "dataset extracted"
            );
        }

        self.prune(self.config.keep_last_extractions)?;
        Ok(summary)
    }

    /// Transform the latest extraction of every catalog dataset.
    pub fn transform(&self) -> anyhow::Result<Vec<TransformSummary>> {
        let transformer = Transformer::new(&self.store, &self.manifest, self.config.quality);
        CATALOG
            .iter()
            .map(|definition| {
                let summary = transformer
                    .transform(definition)
                    .with_context(|| format!("transforming {}", definition.name))?;
                tracing::info!(
                    dataset = %summary.dataset,
                    rows = summary.rows,
                    columns = summary.columns,
                    clean = summary.quality.is_clean(),
                    latest = %summary.latest.display(),
                    "dataset transformed"
                );
                Ok(summary)
            })
            .collect()
    }

    /// Run one analysis, or all of them in order.
    pub fn analyze(&self, only: Option<Analysis>) -> anyhow::Result<Vec<PathBuf>> {
        let analyzer = Analyzer::load(&self.store, &self.manifest, self.config.results_dir.clone())
            .context("loading processed snapshots")?;
        let written = match only {
            Some(analysis) => analyzer
                .run(analysis)
                .with_context(|| format!("analysis {analysis}"))?,
            None => analyzer.run_all().context("analysis run")?,
        };
        for path in &written {
            tracing::info!(path = %path.display(), "result written");
        }
        Ok(written)
    }

    /// Replace the star schema with the current processed snapshots.
    pub fn load(&self) -> anyhow::Result<LoadSummary> {
        let summary = SqlLoader::new(&self.store, &self.manifest, self.config.sql_schema_dir.clone())
            .load(&self.config.db_path)
            .with_context(|| format!("loading {}", self.config.db_path.display()))?;
        for (table, rows) in &summary.tables {
            tracing::info!(table = %table, rows, "table loaded");
        }
        Ok(summary)
    }

    pub fn prune(&self, keep: usize) -> anyhow::Result<PruneReport> {
        let report =
            prune_extractions(&self.store, &self.manifest, keep).context("pruning extractions")?;
        tracing::info!(
            kept = report.kept.len(),
            removed = report.removed.len(),
            deleted_files = report.deleted_files.len(),
            "retention applied"
        );
        Ok(report)
    }

    /// Extract, transform, analyze and load, stopping at the first failure.
    pub fn run(&self, max_rows: Option<usize>) -> anyhow::Result<()> {
        let started = std::time::Instant::now();
        self.extract(max_rows)?;
        self.transform()?;
        self.analyze(None)?;
        self.load()?;
        tracing::info!(elapsed_secs = started.elapsed().as_secs(), "pipeline complete");
        Ok(())
    }
}
