use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] till_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Record ID cannot be empty")]
    EmptyRecordId,
    #[error("Invalid record ID: {0}")]
    InvalidRecordId(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Remote error: {0}")]
    Remote(String),
    #[error(
        "Sync is not configured. Set TILL_REMOTE_URL and TILL_REMOTE_KEY (and optionally TILL_ACCESS_TOKEN) to enable it."
    )]
    SyncNotConfigured,
}
