//! Error types for till-core

use thiserror::Error;

/// Result type alias using till-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in till-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Record failed validation and was rejected before touching the store
    #[error("Validation error: {0}")]
    Validation(String),

    /// Update/delete of an id unknown to the local store
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Durable store error (surfaced only when primary and fallback both fail)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
