//! Extraction error types

use crate::transport::TransportError;
use thiserror::Error;

/// Errors raised while talking to the CBS API or persisting raw snapshots
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Timeout or connection failure after retries were exhausted
    #[error("transport failure for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },

    /// Non-success HTTP status (permanent 4xx, or 5xx/429 after retries)
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("invalid JSON from {url}: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Domain(#[from] housing_domain::DomainError),

    #[error(transparent)]
    Persistence(#[from] housing_persistence::PersistenceError),
}

impl ExtractError {
    /// HTTP status carried by the error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
