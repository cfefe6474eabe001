//! Error types for symbol ingestion.
//!
//! Parse failures are per-file and recovered by the ingestion layer; every
//! other variant aborts the current call and is returned to the caller.

use thiserror::Error;

use crate::formats::ParseError;

/// Main error type for symfeed operations.
#[derive(Debug, Error)]
pub enum SymbolsError {
    /// Malformed or missing identity metadata in one file
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Caller passed a value the operation cannot use
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The content store could not be reached or refused the operation
    #[error("Store unavailable for '{key}': {message}")]
    StoreUnavailable { key: String, message: String },

    /// A store operation did not finish in time
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    /// Ingestion was cancelled by the caller
    #[error("Ingestion cancelled")]
    Cancelled,

    /// A package entry could not be read
    #[error("Failed to read package entry '{name}': {source}")]
    Entry {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SymbolsError {
    pub fn store(key: impl Into<String>, message: impl ToString) -> Self {
        Self::StoreUnavailable {
            key: key.into(),
            message: message.to_string(),
        }
    }

    pub fn entry(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::Entry {
            name: name.into(),
            source,
        }
    }

    /// Whether the failure is confined to a single package entry
    pub fn is_entry_local(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::Entry { .. })
    }
}

impl From<serde_json::Error> for SymbolsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias for symfeed operations
pub type Result<T> = std::result::Result<T, SymbolsError>;
