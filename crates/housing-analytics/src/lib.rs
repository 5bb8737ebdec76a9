//! # CBS Housing Analytics
//!
//! Everything downstream of the raw snapshots.
//!
//! ## Stages
//!
//! - [`transform`]: dimension label joins, period decomposition, measure
//!   renames, quality inspection and derived metrics; writes the processed
//!   snapshots
//! - [`analyzer`]: six statistical analyses over the processed snapshots,
//!   one CSV result table (or two) each
//! - [`loader`]: full-replace load of a DuckDB star schema
//!
//! The statistical kernels in [`stats`] are plain functions over `f64`
//! slices and do not know about frames.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod analyzer;
pub mod error;
pub mod loader;
pub mod stats;
pub mod transform;

pub use analyzer::{Analysis, Analyzer};
pub use error::{AnalyticsError, Result};
pub use loader::{LoadSummary, SqlLoader};
pub use transform::{process, QualityReport, TransformSummary, Transformer};
