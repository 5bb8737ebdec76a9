//! # CBS Housing Extract
//!
//! Retrieval side of the pipeline: a blocking OData client for the CBS open
//! data API with bounded retry and offset pagination, and an extractor that
//! writes one raw snapshot per dimension and fact table.
//!
//! ```rust,ignore
//! use housing_extract::{ApiConfig, CbsClient, Extractor};
//!
//! let client = CbsClient::new(ApiConfig::default())?;
//! let summary = Extractor::new(&client, &store, &manifest).run(&descriptors)?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod error;
pub mod extractor;
pub mod transport;

pub use client::{ApiConfig, CbsClient, MAX_BACKOFF, NON_DIMENSION_ENDPOINTS};
pub use error::{ExtractError, Result};
pub use extractor::{DatasetExtraction, ExtractionSummary, Extractor};
pub use transport::{HttpResponse, ReqwestTransport, Sleeper, ThreadSleeper, Transport, TransportError};
