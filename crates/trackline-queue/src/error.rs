//! Queue error types.

use thiserror::Error;

/// Queue error type.
#[derive(Error, Debug)]
pub enum QueueError {
    /// Persistence failure
    #[error("Database error: {0}")]
    Database(#[from] trackline_database::DatabaseError),

    /// Payload serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using QueueError.
pub type QueueResult<T> = Result<T, QueueError>;
