//! Error types shared by ingestion and query code

use thiserror::Error;

/// Errors produced while loading or querying a table
#[derive(Error, Debug)]
pub enum TableError {
    /// No separator could be inferred from the sampled lines
    #[error("can't identify the separator, set it manually")]
    SeparatorUndetermined,

    /// A line with malformed quoting
    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Strict mode column-count violation
    #[error("row {row} has {found} columns, expected {expected}")]
    SchemaMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// Appending would push memory usage over the configured limit
    #[error("memory limit exceeded: limit {limit} bytes, current usage {current} bytes")]
    MemoryLimitExceeded { limit: u64, current: u64 },

    /// Show/hide column selection out of range, or both given
    #[error("invalid column selection: {0}")]
    InvalidColumnSelector(String),

    /// Bad regex or unparseable comparison threshold
    #[error("invalid filter query: {0}")]
    InvalidFilterQuery(String),

    /// Opening, reading or decompressing the input failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The loader thread went away without reporting a result
    #[error("loader stopped without reporting a result")]
    LoaderDisconnected,
}

impl TableError {
    /// Whether the table remains usable after this error.
    ///
    /// Only the memory limit leaves a consistent, partially loaded table
    /// that callers are expected to keep showing.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TableError::MemoryLimitExceeded { .. })
    }
}

/// Result alias for table operations
pub type Result<T> = std::result::Result<T, TableError>;
