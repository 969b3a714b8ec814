//! Unified error types for archifer
//!
//! Every failure while compiling a fitting model is fatal to that compile
//! call. The variants map onto the three failure classes of the compiler
//! (missing configuration keys, unknown constraint types and broken row
//! filters) plus the table, parsing and solver errors raised around it.
//!
//! # Example
//!
//! ```
//! use archifer_core::{ArchiferError, ArchiferResult};
//!
//! fn lookup(key: &str) -> ArchiferResult<f64> {
//!     Err(ArchiferError::missing("target", key))
//! }
//!
//! assert!(lookup("Af_total").is_err());
//! ```

use polars::prelude::PolarsError;
use thiserror::Error;

/// Error type for all archifer operations.
#[derive(Error, Debug)]
pub enum ArchiferError {
    /// A referenced key (target, constraint field, column) does not exist
    #[error("missing {kind} key '{key}'")]
    MissingKey { kind: &'static str, key: String },

    /// The constraint `type` is not one of sum, share, share_group
    #[error("Unknown constraint type: {0}")]
    UnknownConstraintType(String),

    /// A row filter could not be parsed or evaluated
    #[error("Predicate error: {0}")]
    Predicate(String),

    /// Archetype table access errors (wrong dtype, missing values, ...)
    #[error("Table error: {0}")]
    Table(String),

    /// Configuration values of the wrong shape
    #[error("Configuration error: {0}")]
    Config(String),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Errors reported by the solver backend
    #[error("Solver error: {0}")]
    Solver(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results using ArchiferError.
pub type ArchiferResult<T> = Result<T, ArchiferError>;

impl ArchiferError {
    pub fn missing(kind: &'static str, key: impl Into<String>) -> Self {
        ArchiferError::MissingKey {
            kind,
            key: key.into(),
        }
    }

    /// True for lookup failures, the error class raised for absent keys.
    pub fn is_missing_key(&self) -> bool {
        matches!(self, ArchiferError::MissingKey { .. })
    }
}

impl From<PolarsError> for ArchiferError {
    fn from(err: PolarsError) -> Self {
        ArchiferError::Table(err.to_string())
    }
}
