//! Error types shared by the permutation engine and the data loaders.

use thiserror::Error;

/// Everything that can go wrong while building a household table or running
/// the permutation test.
#[derive(Error, Debug)]
pub enum SegpermError {
    /// A required column is absent: a schema column on load, or a
    /// per-iteration p-value column when averaging.
    #[error("missing column: {column}")]
    MissingColumn { column: String },

    /// The permuted aggregate has no rows, so no p-value can be formed.
    #[error("permuted aggregate for iteration {iteration} is empty; cannot divide by zero rows")]
    EmptyAggregate { iteration: usize },

    /// A variable cell that does not parse as a number.
    #[error("invalid number {value:?} in column {column} at row {row}")]
    InvalidNumber {
        column: String,
        row: usize,
        value: String,
    },

    /// Invalid run configuration (zero iterations, conflicting options)
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Malformed CSV input
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SegpermError>;

impl SegpermError {
    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}
