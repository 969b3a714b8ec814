//! # archifer-core
//!
//! Shared building blocks for fitting building-stock archetype counts:
//!
//! - [`ArchetypeTable`]: polars-backed table of archetypes with typed row filtering
//! - [`RowFilter`]: boolean filter trees, parsed from configuration query strings
//! - [`BuildingSector`]: floor-area totals and per-category breakdowns
//! - [`FitConfig`]: targets, weights and declarative constraint entries
//! - [`ArchiferError`]: error taxonomy shared by all crates

pub mod config;
pub mod error;
pub mod filter;
pub mod sector;
pub mod table;

pub use config::{
    ConstraintSpec, FitConfig, TargetEntry, TargetRef, Targets, WeightRule, Weights,
    CONSTRAINT_TYPES,
};
pub use error::{ArchiferError, ArchiferResult};
pub use filter::{CompareOp, Literal, RowFilter};
pub use sector::{Breakdown, BuildingSector, FLOOR_AREA_COLUMN, USAGE_COLUMN};
pub use table::{ArchetypeTable, ColumnValues};
