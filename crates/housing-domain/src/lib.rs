//! # CBS Housing Pipeline - Domain Model
//!
//! Core types shared by every stage of the pipeline: the static catalog of
//! source tables, CBS period codes, dimension lookup tables and the
//! in-memory [`Frame`] that carries rows between extraction, transformation,
//! analysis and loading.
//!
//! Nothing in this crate performs I/O.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod dataset;
pub mod dimension;
pub mod error;
pub mod frame;
pub mod period;
pub mod quality;

pub use dataset::{DatasetDescriptor, DatasetDefinition, DatasetKind, DimensionSpec, MeasureSpec};
pub use dimension::DimensionTable;
pub use error::{DomainError, Result};
pub use frame::{Cell, Frame};
pub use period::{Granularity, PeriodCode};
pub use quality::QualityRules;
