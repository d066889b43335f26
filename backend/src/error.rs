//! Error types for the catalog import pipeline.
//!
//! Errors are layered so that `?` works across boundaries:
//!
//! - [`CsvError`] - file access and tabular structure errors (fatal to a run)
//! - [`StoreError`] - catalog store failures, including timeouts
//! - [`ProductError`] - the product row could not be created (fatal to one product)
//! - [`ImportError`] - top-level run failures returned by the coordinator
//!
//! Sub-resource failures (variants, sizes, images) and category failures are
//! never raised as errors: they are logged and reported through
//! [`crate::import::MaterializeReport`].

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

// =============================================================================
// CSV Errors
// =============================================================================

/// Errors while opening or reading the CSV export.
#[derive(Debug, Error)]
pub enum CsvError {
    /// The input file is missing or unreadable.
    #[error("Cannot read file '{}': {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed tabular structure.
    #[error("Invalid CSV at line {line}: {message}")]
    Parse { line: u64, message: String },

    /// A required column is absent from the header row.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// No header row at all.
    #[error("CSV file is empty")]
    EmptyFile,
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        let message = match err.kind() {
            csv::ErrorKind::UnequalLengths { expected_len, len, .. } => {
                format!("expected {} fields, found {}", expected_len, len)
            }
            csv::ErrorKind::Utf8 { err, .. } => format!("invalid UTF-8: {}", err),
            _ => err.to_string(),
        };
        CsvError::Parse { line, message }
    }
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors raised by a [`crate::store::CatalogStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The call did not complete within the configured timeout.
    #[error("{operation} timed out after {}ms", after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// SQL backend error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store refused the write.
    #[error("Rejected: {0}")]
    Rejected(String),
}

// =============================================================================
// Product Errors
// =============================================================================

/// The product row insert failed; the handle is abandoned.
#[derive(Debug, Error)]
#[error("Failed to create product '{handle}': {source}")]
pub struct ProductError {
    pub handle: String,
    #[source]
    pub source: StoreError,
}

// =============================================================================
// Import Errors (top-level)
// =============================================================================

/// Run-level failures. Per-product problems never show up here.
#[derive(Debug, Error)]
pub enum ImportError {
    /// CSV file or structure error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// The store could not be opened.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Filesystem error outside of CSV reading (e.g. writing a report).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing the report failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The background task reading the file panicked or was aborted.
    #[error("Read task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for whole import runs.
pub type ImportResult<T> = Result<T, ImportError>;
