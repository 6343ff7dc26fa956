use thiserror::Error;

/// Failures surfaced while constructing or configuring a client.
///
/// Tracking calls themselves never return these. Once the client is up,
/// delivery problems are handled inside the queue and logged.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid tracking URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Database error: {0}")]
    Database(#[from] trackline_database::DatabaseError),
}

pub type ClientResult<T> = Result<T, ClientError>;
