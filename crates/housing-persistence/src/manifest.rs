//! Manifest of extractions and processed snapshots.
//!
//! Replaces discovery by file modification time: every producing step
//! registers the files it wrote, and consumers resolve "the latest" snapshot
//! through this record. The manifest is rewritten atomically (temp file +
//! rename) on every update.

use crate::error::{PersistenceError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// What a raw snapshot holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SnapshotKind {
    Fact,
    Dimension { name: String },
}

/// One raw snapshot, possibly written in several encodings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub dataset: String,
    pub table_id: String,
    pub kind: SnapshotKind,
    /// Paths relative to the data directory
    pub files: Vec<PathBuf>,
}

/// All raw files produced by one extraction run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub extraction_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Timestamp embedded in the file names (`%Y%m%d_%H%M%S`)
    pub timestamp: String,
    #[serde(default)]
    pub snapshots: Vec<SnapshotEntry>,
}

impl ExtractionRecord {
    #[must_use]
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            extraction_id: Uuid::now_v7(),
            started_at,
            timestamp: started_at.format("%Y%m%d_%H%M%S").to_string(),
            snapshots: Vec::new(),
        }
    }

    #[must_use]
    pub fn fact(&self, dataset: &str) -> Option<&SnapshotEntry> {
        self.snapshots
            .iter()
            .find(|s| s.dataset == dataset && s.kind == SnapshotKind::Fact)
    }

    #[must_use]
    pub fn dimension(&self, dataset: &str, name: &str) -> Option<&SnapshotEntry> {
        self.snapshots.iter().find(|s| {
            s.dataset == dataset
                && matches!(&s.kind, SnapshotKind::Dimension { name: n } if n.eq_ignore_ascii_case(name))
        })
    }

    pub fn files(&self) -> impl Iterator<Item = &PathBuf> {
        self.snapshots.iter().flat_map(|s| s.files.iter())
    }
}

/// Current processed output of one dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub extraction_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub files: Vec<PathBuf>,
    /// Stable `<dataset>_latest.csv` path
    pub latest: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub extractions: Vec<ExtractionRecord>,
    #[serde(default)]
    pub processed: BTreeMap<String, ProcessedRecord>,
}

impl Manifest {
    /// Newest extraction (by start time) holding a fact snapshot for `dataset`.
    #[must_use]
    pub fn latest_extraction_for(&self, dataset: &str) -> Option<&ExtractionRecord> {
        self.extractions
            .iter()
            .filter(|e| e.fact(dataset).is_some())
            .max_by_key(|e| e.started_at)
    }

    #[must_use]
    pub fn extraction(&self, id: Uuid) -> Option<&ExtractionRecord> {
        self.extractions.iter().find(|e| e.extraction_id == id)
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Reads and atomically rewrites `manifest.json`
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub const FILE_NAME: &'static str = "manifest.json";

    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(Self::FILE_NAME),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the manifest; a missing file is an empty manifest.
    pub fn load(&self) -> Result<Manifest> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Manifest::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, manifest: &Manifest) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(manifest)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Load, apply `f`, save.
    pub fn update<T>(&self, f: impl FnOnce(&mut Manifest) -> Result<T>) -> Result<T> {
        let mut manifest = self.load()?;
        let out = f(&mut manifest)?;
        self.save(&manifest)?;
        Ok(out)
    }

    /// Register a new, still empty extraction.
    pub fn begin_extraction(&self, record: &ExtractionRecord) -> Result<()> {
        self.update(|m| {
            m.extractions.push(record.clone());
            Ok(())
        })
    }

    /// Attach a written snapshot to its extraction.
    pub fn record_snapshot(&self, extraction_id: Uuid, entry: SnapshotEntry) -> Result<()> {
        self.update(|m| {
            let record = m
                .extractions
                .iter_mut()
                .find(|e| e.extraction_id == extraction_id)
                .ok_or(PersistenceError::UnknownExtraction(extraction_id))?;
            record.snapshots.push(entry);
            Ok(())
        })
    }

    pub fn record_processed(&self, dataset: &str, record: ProcessedRecord) -> Result<()> {
        self.update(|m| {
            m.processed.insert(dataset.to_string(), record);
            Ok(())
        })
    }

    /// Path (relative to the data directory) of the current processed
    /// snapshot of `dataset`.
    pub fn latest_processed(&self, dataset: &str) -> Result<PathBuf> {
        self.load()?
            .processed
            .get(dataset)
            .map(|p| p.latest.clone())
            .ok_or_else(|| PersistenceError::NoSnapshot {
                dataset: dataset.to_string(),
                what: "processed snapshot".to_string(),
            })
    }
}
