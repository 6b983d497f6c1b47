//! Error types for the topicsink connectors.
//!
//! One error type covers configuration parsing, decoding, sink and source
//! failures, and the two batch-level conditions the pipeline reports:
//! a malformed poll result and an update that matched no rows.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while ingesting or writing batches.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A record value could not be decoded into a message.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Failed to connect to an external system.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The sink rejected an execution.
    #[error("Sink error: {0}")]
    SinkError(String),

    /// Error in a log source.
    #[error("Source error: {0}")]
    SourceError(String),

    /// Error in the connector runtime.
    #[error("Runtime error: {0}")]
    RuntimeError(String),

    /// A poll result that cannot be treated as one batch.
    #[error("Malformed batch: {0}")]
    MalformedBatch(String),

    /// The statement names a parameter the row does not carry.
    #[error("Missing parameter ':{0}' in row")]
    MissingParameter(String),

    /// A sink call did not finish within the configured deadline.
    #[error("Sink call timed out after {0:?}")]
    Timeout(Duration),

    /// The statement ran but matched nothing for one item.
    #[error("Item {index} of {total} did not update any rows: [{item}]")]
    NoRowsAffected {
        index: usize,
        total: usize,
        item: String,
    },

    /// Database driver error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Record or attribute conversion error.
    #[error(transparent)]
    Record(#[from] topicsink_core::Error),
}

/// Result type alias for connector operations.
pub type Result<T> = std::result::Result<T, ConnectorError>;

impl From<serde_json::Error> for ConnectorError {
    fn from(e: serde_json::Error) -> Self {
        ConnectorError::SerializationError(e.to_string())
    }
}
