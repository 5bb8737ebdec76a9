//! Persistence layer error types

use std::path::PathBuf;
use thiserror::Error;

/// Persistence layer errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Domain(#[from] housing_domain::DomainError),

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unsupported snapshot format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("No {what} recorded for dataset {dataset}")]
    NoSnapshot { dataset: String, what: String },

    #[error("Unknown extraction: {0}")]
    UnknownExtraction(uuid::Uuid),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;
