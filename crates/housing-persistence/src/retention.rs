//! Retention of raw extractions.
//!
//! Files are grouped by the extraction that produced them, as recorded in
//! the manifest, so a partial extraction is kept or removed as one unit.

use crate::error::Result;
use crate::manifest::ManifestStore;
use crate::snapshot::SnapshotStore;
use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

/// Outcome of a prune pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub kept: Vec<Uuid>,
    pub removed: Vec<Uuid>,
    pub deleted_files: Vec<PathBuf>,
}

/// Keep the newest `keep` extractions by start time and delete every file of
/// the others. Files already gone are skipped.
pub fn prune_extractions(
    store: &SnapshotStore,
    manifest: &ManifestStore,
    keep: usize,
) -> Result<PruneReport> {
    manifest.update(|m| {
        m.extractions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        let removed = m.extractions.split_off(keep.min(m.extractions.len()));

        let mut report = PruneReport {
            kept: m.extractions.iter().map(|e| e.extraction_id).collect(),
            ..PruneReport::default()
        };

        for extraction in removed {
            tracing::info!(
                extraction_id = %extraction.extraction_id,
                timestamp = %extraction.timestamp,
                "removing extraction"
            );
            for relative in extraction.files() {
                match fs::remove_file(store.resolve(relative)) {
                    Ok(()) => report.deleted_files.push(relative.clone()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        tracing::debug!(path = %relative.display(), "already deleted");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            report.removed.push(extraction.extraction_id);
        }
        Ok(report)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ExtractionRecord, SnapshotEntry, SnapshotKind};
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn extraction(store: &SnapshotStore, minutes_ago: i64, files: &[&str]) -> ExtractionRecord {
        let mut record = ExtractionRecord::new(Utc::now() - Duration::minutes(minutes_ago));
        for file in files {
            fs::write(store.resolve(std::path::Path::new(file)), b"x").unwrap();
        }
        record.snapshots.push(SnapshotEntry {
            dataset: "doorlooptijden".to_string(),
            table_id: "86260NED".to_string(),
            kind: SnapshotKind::Fact,
            files: files.iter().map(PathBuf::from).collect(),
        });
        record
    }

    #[test]
    fn test_prune_keeps_newest_and_deletes_whole_groups() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();
        let manifest = ManifestStore::in_dir(dir.path());

        let old = extraction(&store, 60, &["raw/old.csv", "raw/old.parquet"]);
        let mid = extraction(&store, 30, &["raw/mid.csv"]);
        let new = extraction(&store, 1, &["raw/new.csv"]);
        for record in [&mid, &old, &new] {
            manifest.begin_extraction(record).unwrap();
        }

        let report = prune_extractions(&store, &manifest, 1).unwrap();

        assert_eq!(report.kept, vec![new.extraction_id]);
        assert_eq!(report.removed.len(), 2);
        assert_eq!(report.deleted_files.len(), 3);
        assert!(dir.path().join("raw/new.csv").exists());
        assert!(!dir.path().join("raw/old.parquet").exists());
        assert!(!dir.path().join("raw/mid.csv").exists());
        assert_eq!(manifest.load().unwrap().extractions.len(), 1);
    }

    #[test]
    fn test_prune_tolerates_missing_files() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();
        let manifest = ManifestStore::in_dir(dir.path());

        let old = extraction(&store, 10, &["raw/gone.csv"]);
        fs::remove_file(dir.path().join("raw/gone.csv")).unwrap();
        manifest.begin_extraction(&old).unwrap();
        manifest.begin_extraction(&extraction(&store, 0, &[])).unwrap();

        let report = prune_extractions(&store, &manifest, 1).unwrap();
        assert_eq!(report.removed, vec![old.extraction_id]);
        assert!(report.deleted_files.is_empty());
    }

    #[test]
    fn test_keep_more_than_available() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();
        let manifest = ManifestStore::in_dir(dir.path());
        manifest
            .begin_extraction(&extraction(&store, 0, &["raw/a.csv"]))
            .unwrap();

        let report = prune_extractions(&store, &manifest, 5).unwrap();
        assert!(report.removed.is_empty());
        assert_eq!(report.kept.len(), 1);
    }
}
