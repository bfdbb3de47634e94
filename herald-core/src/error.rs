//! Error types for herald-core

use thiserror::Error;

/// Main error type for the herald-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Caller passed a malformed value
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Endpoint could not be turned into a transport
    #[error("transport error: {0}")]
    Transport(String),

    /// Could not reach the remote service
    #[error("failed to connect to {endpoint}: {source}")]
    Network {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// Remote call failed after the connection was made
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// Executor no longer accepts tasks
    #[error("task rejected: {0}")]
    Rejected(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }
}

/// Result type alias for herald-core
pub type Result<T> = std::result::Result<T, Error>;
