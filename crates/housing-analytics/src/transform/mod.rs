//! Raw snapshot to processed table.
//!
//! The transformer resolves its inputs through the manifest: the newest
//! extraction holding a fact snapshot for the dataset, and the dimension
//! snapshots of that same extraction.

pub mod derive;
pub mod join;
pub mod quality;

use crate::error::{AnalyticsError, Result};
use chrono::{DateTime, Utc};
use housing_domain::{DatasetDefinition, DimensionTable, Frame, QualityRules};
use housing_persistence::{
    ExtractionRecord, ManifestStore, ProcessedRecord, SnapshotEntry, SnapshotFormat, SnapshotStore,
};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub use quality::QualityReport;

/// Outcome of transforming one dataset
#[derive(Debug, Clone, PartialEq)]
pub struct TransformSummary {
    pub dataset: String,
    pub extraction_id: Uuid,
    pub rows: usize,
    pub columns: usize,
    pub files: Vec<PathBuf>,
    pub latest: PathBuf,
    pub quality: QualityReport,
}

pub struct Transformer<'a> {
    store: &'a SnapshotStore,
    manifest: &'a ManifestStore,
    rules: QualityRules,
    formats: Vec<SnapshotFormat>,
}

impl<'a> Transformer<'a> {
    pub fn new(store: &'a SnapshotStore, manifest: &'a ManifestStore, rules: QualityRules) -> Self {
        Self {
            store,
            manifest,
            rules,
            formats: vec![SnapshotFormat::Csv, SnapshotFormat::Parquet],
        }
    }

    #[must_use]
    pub fn with_formats(mut self, formats: Vec<SnapshotFormat>) -> Self {
        self.formats = formats;
        self
    }

    pub fn transform(&self, definition: &DatasetDefinition) -> Result<TransformSummary> {
        self.transform_at(definition, Utc::now())
    }

    /// Load the latest raw snapshot of `definition`, process it and persist
    /// both the timestamped and the `latest` processed files.
    pub fn transform_at(
        &self,
        definition: &DatasetDefinition,
        now: DateTime<Utc>,
    ) -> Result<TransformSummary> {
        tracing::info!(dataset = definition.name, table = definition.table_id, "transforming dataset");

        let manifest = self.manifest.load()?;
        let extraction = manifest.latest_extraction_for(definition.name).ok_or_else(|| {
            AnalyticsError::MissingInput(format!("no raw fact snapshot for {}", definition.name))
        })?;

        let facts = self.read_fact(extraction, definition)?;
        tracing::info!(
            dataset = definition.name,
            extraction_id = %extraction.extraction_id,
            rows = facts.height(),
            columns = facts.width(),
            "loaded raw facts"
        );
        let dimensions = self.read_dimensions(extraction, definition)?;

        let (frame, quality) = process(definition, facts, &dimensions, &self.rules)?;

        let timestamp = now.format("%Y%m%d_%H%M%S");
        let stem = PathBuf::from(SnapshotStore::PROCESSED_DIR)
            .join(format!("{}_transformed_{timestamp}", definition.name));
        let files = self.store.write(&stem, &frame, &self.formats)?;
        let latest = latest_path(definition.name);
        self.store.write_file(&latest, &frame)?;
        for file in files.iter().chain(std::iter::once(&latest)) {
            tracing::info!(path = %file.display(), rows = frame.height(), "saved processed snapshot");
        }

        self.manifest.record_processed(
            definition.name,
            ProcessedRecord {
                extraction_id: extraction.extraction_id,
                created_at: now,
                files: files.clone(),
                latest: latest.clone(),
            },
        )?;

        Ok(TransformSummary {
            dataset: definition.name.to_string(),
            extraction_id: extraction.extraction_id,
            rows: frame.height(),
            columns: frame.width(),
            files,
            latest,
            quality,
        })
    }

    fn read_fact(&self, extraction: &ExtractionRecord, definition: &DatasetDefinition) -> Result<Frame> {
        let entry = extraction.fact(definition.name).ok_or_else(|| {
            AnalyticsError::MissingInput(format!("no raw fact snapshot for {}", definition.name))
        })?;
        let file = preferred_file(entry).ok_or_else(|| {
            AnalyticsError::MissingInput(format!("fact snapshot for {} lists no files", definition.name))
        })?;
        self.store.read(file).map_err(AnalyticsError::from_read)
    }

    fn read_dimensions(
        &self,
        extraction: &ExtractionRecord,
        definition: &DatasetDefinition,
    ) -> Result<Vec<DimensionTable>> {
        let mut tables = Vec::with_capacity(definition.dimensions.len());
        for dim in definition.dimensions {
            let Some(file) = extraction
                .dimension(definition.name, dim.name)
                .and_then(preferred_file)
            else {
                tracing::warn!(dataset = definition.name, dimension = dim.name, "no dimension snapshot");
                continue;
            };
            match self.store.read(file) {
                Ok(frame) => tables.push(DimensionTable::from_frame(dim.name, &frame)),
                Err(housing_persistence::PersistenceError::NotFound(path)) => {
                    tracing::warn!(
                        dataset = definition.name,
                        dimension = dim.name,
                        path = %path.display(),
                        "dimension snapshot missing on disk"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(tables)
    }
}

/// The pure transformation: label joins, period split, measure renames,
/// quality inspection and derived metrics.
pub fn process(
    definition: &DatasetDefinition,
    mut frame: Frame,
    dimensions: &[DimensionTable],
    rules: &QualityRules,
) -> Result<(Frame, QualityReport)> {
    let codes: Vec<&str> = definition.dimensions.iter().map(|d| d.name).collect();
    frame.require(&codes, definition.name)?;

    join::attach_labels(&mut frame, definition, dimensions)?;
    join::decompose_periods(&mut frame, definition)?;

    frame.rename_columns(&definition.rename_map());
    frame.require(&definition.measure_names(), definition.name)?;

    let report = quality::inspect(definition.name, &frame, &definition.measure_names(), rules);
    derive::apply(&mut frame, definition.kind)?;

    tracing::info!(
        dataset = definition.name,
        rows = frame.height(),
        columns = frame.width(),
        "transformation complete"
    );
    Ok((frame, report))
}

/// `processed/<dataset>_latest.csv`, relative to the data directory.
#[must_use]
pub fn latest_path(dataset: &str) -> PathBuf {
    Path::new(SnapshotStore::PROCESSED_DIR).join(format!("{dataset}_latest.csv"))
}

/// Parquet when available (exact types), otherwise the first listed file.
pub(crate) fn preferred_file(entry: &SnapshotEntry) -> Option<&PathBuf> {
    entry
        .files
        .iter()
        .find(|f| SnapshotFormat::from_path(f) == Some(SnapshotFormat::Parquet))
        .or_else(|| entry.files.first())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use housing_domain::dataset::DOORLOOPTIJDEN;
    use housing_domain::Cell;
    use housing_persistence::SnapshotKind;
    use tempfile::TempDir;

    fn raw_facts() -> Frame {
        Frame::from_columns([
            ("ID", vec![Cell::from(0_i64), Cell::from(1_i64)]),
            ("Regiokenmerken", vec![Cell::from("NL01"), Cell::from("NL01")]),
            ("Gebruiksfunctie", vec![Cell::from("A045364"), Cell::from("A045364")]),
            ("Woningtype", vec![Cell::from("ZW25805"), Cell::from("ZW25806")]),
            ("Perioden", vec![Cell::from("2020KW01"), Cell::from("2020KW02")]),
            ("NieuwbouwTotaal_1", vec![Cell::from(100_i64), Cell::from(80_i64)]),
            ("k_10KwantielDoorlooptijdMaanden_2", vec![Cell::from(6.0), Cell::from(7.0)]),
            ("k_25KwantielDoorlooptijdMaanden_3", vec![Cell::from(9.0), Cell::from(10.0)]),
            ("MediaanDoorlooptijdMaanden_4", vec![Cell::from(12.0), Cell::from(14.0)]),
            ("k_75KwantielDoorlooptijdMaanden_5", vec![Cell::from(18.0), Cell::from(30.0)]),
            ("k_90KwantielDoorlooptijdMaanden_6", vec![Cell::from(24.0), Cell::from(40.0)]),
            ("GemiddeldeDoorlooptijdMaanden_7", vec![Cell::from(13.0), Cell::from(17.5)]),
        ])
        .unwrap()
    }

    fn seed(dir: &Path) -> (SnapshotStore, ManifestStore) {
        let store = SnapshotStore::open(dir).unwrap();
        let manifest = ManifestStore::in_dir(dir);
        let record = ExtractionRecord::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        manifest.begin_extraction(&record).unwrap();

        let fact_stem = Path::new("raw/fact_doorlooptijden_2020_2020_86260NED_20240101_000000");
        let files = store.write(fact_stem, &raw_facts(), &[SnapshotFormat::Csv]).unwrap();
        manifest
            .record_snapshot(
                record.extraction_id,
                SnapshotEntry {
                    dataset: "doorlooptijden".into(),
                    table_id: "86260NED".into(),
                    kind: SnapshotKind::Fact,
                    files,
                },
            )
            .unwrap();

        let types = Frame::from_columns([
            ("Key", vec![Cell::from("ZW25805"), Cell::from("ZW25806")]),
            ("Title", vec![Cell::from("Eengezinswoning"), Cell::from("Meergezinswoning")]),
        ])
        .unwrap();
        let dim_stem = Path::new("raw/dim_woningtype_86260NED_20240101_000000");
        let files = store.write(dim_stem, &types, &[SnapshotFormat::Csv]).unwrap();
        manifest
            .record_snapshot(
                record.extraction_id,
                SnapshotEntry {
                    dataset: "doorlooptijden".into(),
                    table_id: "86260NED".into(),
                    kind: SnapshotKind::Dimension {
                        name: "Woningtype".into(),
                    },
                    files,
                },
            )
            .unwrap();
        (store, manifest)
    }

    #[test]
    fn test_transform_writes_latest_and_registers() {
        let dir = TempDir::new().unwrap();
        let (store, manifest) = seed(dir.path());
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap();

        let summary = Transformer::new(&store, &manifest, QualityRules::default())
            .with_formats(vec![SnapshotFormat::Csv])
            .transform_at(&DOORLOOPTIJDEN, now)
            .unwrap();

        assert_eq!(summary.rows, 2);
        assert_eq!(
            summary.files,
            vec![PathBuf::from("processed/doorlooptijden_transformed_20240102_080000.csv")]
        );
        assert_eq!(manifest.latest_processed("doorlooptijden").unwrap(), summary.latest);

        let processed = store.read(&summary.latest).unwrap();
        assert_eq!(
            processed.column_text("Woningtype_Naam").unwrap(),
            vec![Some("Eengezinswoning".to_string()), Some("Meergezinswoning".to_string())]
        );
        assert!(processed.column("Regio_Naam").unwrap().iter().all(Cell::is_null));
        assert_eq!(processed.column_f64("Doorlooptijd_IQR").unwrap(), vec![Some(9.0), Some(20.0)]);
        assert_eq!(processed.column_f64("Hoge_Variabiliteit").unwrap(), vec![Some(0.0), Some(1.0)]);
        assert_eq!(processed.column_f64("Kwartaal").unwrap(), vec![Some(1.0), Some(2.0)]);
    }

    #[test]
    fn test_missing_raw_fact_is_missing_input() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();
        let manifest = ManifestStore::in_dir(dir.path());

        let err = Transformer::new(&store, &manifest, QualityRules::default())
            .transform(&DOORLOOPTIJDEN)
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::MissingInput(_)));
    }

    #[test]
    fn test_missing_measure_column_lists_available() {
        let mut facts = raw_facts();
        facts.drop_column("MediaanDoorlooptijdMaanden_4");

        let err = process(&DOORLOOPTIJDEN, facts, &[], &QualityRules::default()).unwrap_err();
        match err {
            AnalyticsError::Domain(housing_domain::DomainError::MissingColumns { missing, available, .. }) => {
                assert_eq!(missing, vec!["Doorlooptijd_Mediaan".to_string()]);
                assert!(available.contains(&"Doorlooptijd_P25".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
