//! # CBS Housing Persistence
//!
//! File-based storage for the housing pipeline.
//!
//! ## Layout
//!
//! ```text
//! data/
//! ├── manifest.json              extraction + processed registry
//! ├── raw/
//! │   ├── dim_<dimension>_<table>_<ts>.{csv,parquet}
//! │   └── fact_<dataset>_<start>_<end>_<table>_<ts>.{csv,parquet}
//! └── processed/
//!     ├── <dataset>_transformed_<ts>.{csv,parquet}
//!     └── <dataset>_latest.csv
//! ```
//!
//! - [`snapshot`]: CSV/Parquet encode and decode through an in-memory DuckDB
//! - [`manifest`]: which files belong to which extraction, and which
//!   processed snapshot is current
//! - [`retention`]: prune old extractions as whole units

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod manifest;
pub mod retention;
pub mod snapshot;

pub use error::{PersistenceError, Result};
pub use manifest::{
    ExtractionRecord, Manifest, ManifestStore, ProcessedRecord, SnapshotEntry, SnapshotKind,
};
pub use retention::{prune_extractions, PruneReport};
pub use snapshot::{read_frame, write_frame, SnapshotFormat, SnapshotStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
