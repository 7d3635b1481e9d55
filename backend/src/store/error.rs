//! Storage error types

use thiserror::Error;

/// Errors raised by key-value stores and the profile store on top of them
#[derive(Error, Debug)]
pub enum StoreError {
    /// The underlying storage engine failed
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// A stored blob could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}
