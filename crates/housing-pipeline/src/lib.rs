//! # CBS Housing Pipeline
//!
//! Configuration and orchestration for the `housing` binary.
//!
//! ## Flow
//!
//! ```text
//! CBS OData API ──extract──▶ data/raw ──transform──▶ data/processed
//!                                                        │
//!                                   ┌────────────────────┴──────────┐
//!                                   ▼                               ▼
//!                           analyze: results/*.csv       load: housing.duckdb
//! ```
//!
//! The manifest in the data directory records which snapshots belong to
//! which extraction and which processed snapshot is current.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod commands;
pub mod config;

pub use commands::Pipeline;
pub use config::{Config, ExtractionSettings};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
