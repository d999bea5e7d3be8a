//! Core error types for the extraction pipeline.
//!
//! The taxonomy follows how each failure is recovered: geometry problems are
//! handled locally and never surface here, a detection failure aborts one
//! document but not its batch siblings, schema problems fail fast before any
//! DDL runs, and record-level primary-key violations are reported as summary
//! counts rather than errors.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results produced by this crate.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Errors that can occur in the extraction pipeline.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The detection engine signalled unrecoverable failure for a document.
    ///
    /// Aborts processing for that one document; sibling documents in a batch
    /// continue.
    #[error("detection failed for document '{document}'")]
    DetectionFailed {
        /// The document the engine failed on.
        document: String,
    },

    /// A schema validation problem, reported before any database mutation.
    #[error("schema: {message}")]
    Schema {
        /// A message describing the schema problem.
        message: String,
    },

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error from the underlying SQLite store.
    #[error("persistence")]
    Persistence(#[from] rusqlite::Error),

    /// Error reading or writing a schema template file.
    #[error("template file '{path}'")]
    Template {
        /// Path of the template document.
        path: PathBuf,
        /// The underlying serialization error.
        #[source]
        source: serde_json::Error,
    },

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    /// Creates an invalid-input error from a message.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a schema error with context and details.
    ///
    /// # Arguments
    ///
    /// * `context` - High-level description of what was being validated
    /// * `details` - Specific details about what went wrong
    pub fn schema_error_detailed(context: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Schema {
            message: format!("{}: {}", context.into(), details.into()),
        }
    }

    /// Creates a detection-failed error for a document.
    pub fn detection_failed(document: impl Into<String>) -> Self {
        Self::DetectionFailed {
            document: document.into(),
        }
    }
}
