//! Storage error types.

use dl_protocol::DetectionError;
use thiserror::Error;

/// Errors raised by record store backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to serialize detections: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid detection: {0}")]
    InvalidDetection(#[from] DetectionError),

    #[error("record {id} is corrupt: {reason}")]
    Corrupt { id: i64, reason: String },
}

/// Convenience alias for storage results.
pub type StorageResult<T> = Result<T, StorageError>;
