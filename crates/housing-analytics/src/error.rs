//! Analytics error types.

use housing_domain::DomainError;
use housing_persistence::PersistenceError;
use thiserror::Error;

/// Analytics errors.
#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// DuckDB error
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// Missing column or malformed domain value
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Snapshot or manifest failure
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// An input the step depends on does not exist
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// Too few groups or observations for a statistical test
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Distribution construction or numeric failure
    #[error("Statistics error: {0}")]
    Statistics(String),

    /// Unknown analysis name
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalyticsError {
    /// Map a missing snapshot to [`AnalyticsError::MissingInput`].
    pub(crate) fn from_read(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound(path) => Self::MissingInput(path.display().to_string()),
            PersistenceError::NoSnapshot { dataset, what } => {
                Self::MissingInput(format!("no {what} for {dataset}"))
            }
            other => Self::Persistence(other),
        }
    }
}

/// Result type for analytics operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;
