//! Domain error types

use thiserror::Error;

/// Errors raised while building or querying domain values
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("missing columns in {dataset}: {missing:?}; available columns: {available:?}")]
    MissingColumns {
        dataset: String,
        missing: Vec<String>,
        available: Vec<String>,
    },

    #[error("column {column} has {found} rows, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid period code: {0:?}")]
    InvalidPeriod(String),

    #[error("invalid granularity: {0:?} (expected month, quarter or year)")]
    InvalidGranularity(String),

    #[error("unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("expected a JSON object per row, got: {0}")]
    NotAnObject(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DomainError>;
