//! Drives the client once per dataset and persists raw snapshots.

use crate::client::CbsClient;
use crate::error::Result;
use crate::transport::{Sleeper, Transport};
use chrono::{DateTime, Utc};
use housing_domain::{DatasetDescriptor, Frame};
use housing_persistence::{
    ExtractionRecord, ManifestStore, SnapshotEntry, SnapshotFormat, SnapshotKind, SnapshotStore,
};
use std::path::PathBuf;
use uuid::Uuid;

/// Rows and dimension sizes extracted for one dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetExtraction {
    pub dataset: String,
    pub fact_rows: usize,
    pub dimensions: Vec<(String, usize)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionSummary {
    pub extraction_id: Uuid,
    pub timestamp: String,
    pub datasets: Vec<DatasetExtraction>,
}

/// Writes raw snapshots for each descriptor and registers them in the
/// manifest as they are written.
pub struct Extractor<'a, T: Transport, S: Sleeper> {
    client: &'a CbsClient<T, S>,
    store: &'a SnapshotStore,
    manifest: &'a ManifestStore,
    formats: Vec<SnapshotFormat>,
    max_rows: Option<usize>,
}

impl<'a, T: Transport, S: Sleeper> Extractor<'a, T, S> {
    pub fn new(
        client: &'a CbsClient<T, S>,
        store: &'a SnapshotStore,
        manifest: &'a ManifestStore,
    ) -> Self {
        Self {
            client,
            store,
            manifest,
            formats: vec![SnapshotFormat::Csv, SnapshotFormat::Parquet],
            max_rows: None,
        }
    }

    #[must_use]
    pub fn with_formats(mut self, formats: Vec<SnapshotFormat>) -> Self {
        self.formats = formats;
        self
    }

    #[must_use]
    pub const fn with_max_rows(mut self, max_rows: Option<usize>) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Extract every descriptor under one extraction id.
    pub fn run(&self, descriptors: &[DatasetDescriptor]) -> Result<ExtractionSummary> {
        self.run_at(descriptors, Utc::now())
    }

    pub fn run_at(
        &self,
        descriptors: &[DatasetDescriptor],
        started_at: DateTime<Utc>,
    ) -> Result<ExtractionSummary> {
        let record = ExtractionRecord::new(started_at);
        self.manifest.begin_extraction(&record)?;
        tracing::info!(
            extraction_id = %record.extraction_id,
            timestamp = %record.timestamp,
            datasets = descriptors.len(),
            "extraction started"
        );

        let datasets = descriptors
            .iter()
            .map(|d| self.extract_dataset(&record, d))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(extraction_id = %record.extraction_id, "extraction complete");
        Ok(ExtractionSummary {
            extraction_id: record.extraction_id,
            timestamp: record.timestamp,
            datasets,
        })
    }

    fn extract_dataset(
        &self,
        record: &ExtractionRecord,
        descriptor: &DatasetDescriptor,
    ) -> Result<DatasetExtraction> {
        let def = descriptor.definition;
        tracing::info!(
            dataset = def.name,
            table = def.table_id,
            start_year = descriptor.start_year,
            end_year = descriptor.end_year,
            granularity = %descriptor.granularity,
            "extracting dataset"
        );

        let mut dimensions = Vec::new();
        for (name, frame) in self.client.fetch_all_dimensions(def.table_id)? {
            let stem = PathBuf::from(SnapshotStore::RAW_DIR).join(format!(
                "dim_{}_{}_{}",
                name.to_lowercase(),
                def.table_id,
                record.timestamp
            ));
            self.persist(
                record,
                descriptor,
                SnapshotKind::Dimension { name: name.clone() },
                &stem,
                &frame,
            )?;
            dimensions.push((name, frame.height()));
        }

        let filter = descriptor.period_filter();
        tracing::info!(dataset = def.name, filter = %filter, "fetching fact table");
        let facts = self.client.fetch_paginated(
            def.table_id,
            &[filter],
            &def.select_columns(),
            self.max_rows,
        )?;
        log_null_report(def.name, &facts);

        let stem = PathBuf::from(SnapshotStore::RAW_DIR).join(format!(
            "fact_{}_{}_{}_{}_{}",
            def.name, descriptor.start_year, descriptor.end_year, def.table_id, record.timestamp
        ));
        self.persist(record, descriptor, SnapshotKind::Fact, &stem, &facts)?;

        Ok(DatasetExtraction {
            dataset: def.name.to_string(),
            fact_rows: facts.height(),
            dimensions,
        })
    }

    fn persist(
        &self,
        record: &ExtractionRecord,
        descriptor: &DatasetDescriptor,
        kind: SnapshotKind,
        stem: &std::path::Path,
        frame: &Frame,
    ) -> Result<()> {
        let files = self.store.write(stem, frame, &self.formats)?;
        for file in &files {
            tracing::info!(path = %file.display(), rows = frame.height(), "saved snapshot");
        }
        self.manifest.record_snapshot(
            record.extraction_id,
            SnapshotEntry {
                dataset: descriptor.definition.name.to_string(),
                table_id: descriptor.definition.table_id.to_string(),
                kind,
                files,
            },
        )?;
        Ok(())
    }
}

/// Non-blocking quality side check: per-column null counts.
#[allow(clippy::cast_precision_loss)]
pub fn log_null_report(dataset: &str, frame: &Frame) {
    tracing::info!(dataset, rows = frame.height(), columns = frame.width(), "data quality summary");
    if frame.is_empty() {
        return;
    }
    for (column, nulls) in frame.null_counts() {
        if nulls > 0 {
            let pct = nulls as f64 / frame.height() as f64 * 100.0;
            tracing::warn!(dataset, column = %column, nulls, pct = %format_args!("{pct:.1}"), "null values detected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiConfig;
    use crate::transport::testing::{RecordingSleeper, ScriptedTransport};
    use crate::transport::HttpResponse;
    use chrono::TimeZone;
    use housing_domain::dataset::DOORLOOPTIJDEN;
    use housing_domain::Granularity;
    use serde_json::json;
    use tempfile::TempDir;

    fn cbs_stub() -> ScriptedTransport {
        ScriptedTransport::responder(|req| {
            let body = if req.url.ends_with("/86260NED") {
                json!({"value": [{"name": "TypedDataSet"}, {"name": "Woningtype"}, {"name": "Perioden"}]})
            } else if req.url.ends_with("/Woningtype") {
                json!({"value": [{"Key": "ZW25805", "Title": "Eengezinswoning"}]})
            } else if req.url.ends_with("/Perioden") {
                json!({"value": [{"Key": "2020KW01", "Title": "2020 1e kwartaal"}]})
            } else {
                json!({"value": [
                    {"ID": 0, "Regiokenmerken": "NL01", "Woningtype": "ZW25805",
                     "Perioden": "2020KW01", "MediaanDoorlooptijdMaanden_4": 14.0},
                    {"ID": 1, "Regiokenmerken": "NL01", "Woningtype": "ZW25805",
                     "Perioden": "2020KW02", "MediaanDoorlooptijdMaanden_4": null}
                ]})
            };
            Ok(HttpResponse::new(200, body.to_string()))
        })
    }

    #[test]
    fn test_extraction_writes_and_registers_snapshots() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();
        let manifest = ManifestStore::in_dir(dir.path());
        let client = CbsClient::with_transport(ApiConfig::default(), cbs_stub(), RecordingSleeper::default());

        let started = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let descriptor = DatasetDescriptor::new(&DOORLOOPTIJDEN, 2020, 2020, Granularity::Quarter);
        let summary = Extractor::new(&client, &store, &manifest)
            .run_at(&[descriptor], started)
            .unwrap();

        assert_eq!(summary.timestamp, "20240301_123000");
        assert_eq!(summary.datasets[0].fact_rows, 2);
        assert_eq!(summary.datasets[0].dimensions.len(), 2);

        let loaded = manifest.load().unwrap();
        let record = loaded.extraction(summary.extraction_id).unwrap();
        let fact = record.fact("doorlooptijden").unwrap();
        assert_eq!(
            fact.files,
            vec![
                PathBuf::from("raw/fact_doorlooptijden_2020_2020_86260NED_20240301_123000.csv"),
                PathBuf::from("raw/fact_doorlooptijden_2020_2020_86260NED_20240301_123000.parquet"),
            ]
        );
        let dim = record.dimension("doorlooptijden", "Woningtype").unwrap();
        assert_eq!(dim.files[0], PathBuf::from("raw/dim_woningtype_86260NED_20240301_123000.csv"));
        assert!(store.resolve(&dim.files[1]).exists());

        let requests = client_requests(&client);
        let data_request = requests.iter().find(|r| r.url.ends_with("TypedDataSet")).unwrap();
        assert_eq!(
            data_request.param("$filter"),
            Some("Perioden ge '2020KW01' and Perioden le '2020KW04'")
        );
        assert!(data_request
            .param("$select")
            .unwrap()
            .starts_with("ID,Regiokenmerken,Gebruiksfunctie,Woningtype,Perioden,"));
    }

    fn client_requests(
        client: &CbsClient<ScriptedTransport, RecordingSleeper>,
    ) -> Vec<crate::transport::testing::Request> {
        client.transport().requests.borrow().clone()
    }

    #[test]
    fn test_failed_fact_fetch_keeps_partial_extraction_tracked() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();
        let manifest = ManifestStore::in_dir(dir.path());
        let transport = ScriptedTransport::responder(|req| {
            if req.url.ends_with("TypedDataSet") {
                return Ok(HttpResponse::new(404, ""));
            }
            let body = if req.url.ends_with("/86260NED") {
                json!({"value": [{"name": "Woningtype"}]})
            } else {
                json!({"value": [{"Key": "A", "Title": "B"}]})
            };
            Ok(HttpResponse::new(200, body.to_string()))
        });
        let client = CbsClient::with_transport(ApiConfig::default(), transport, RecordingSleeper::default());
        let descriptor = DatasetDescriptor::new(&DOORLOOPTIJDEN, 2020, 2021, Granularity::Quarter);

        let result = Extractor::new(&client, &store, &manifest)
            .with_formats(vec![SnapshotFormat::Csv])
            .run(&[descriptor]);
        assert!(result.is_err());

        let loaded = manifest.load().unwrap();
        assert_eq!(loaded.extractions.len(), 1);
        assert_eq!(loaded.extractions[0].snapshots.len(), 1);
        assert!(loaded.extractions[0].fact("doorlooptijden").is_none());
    }
}
