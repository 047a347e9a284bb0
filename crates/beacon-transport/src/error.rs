//! Transport error types

use thiserror::Error;

/// Failures reaching the registry or getting a non-success response.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Request never produced a usable response
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Registry answered with a non-success status
    #[error("registry returned {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body, when one was readable
        message: String,
    },

    /// Registry endpoint could not be used to build a client
    #[error("invalid registry endpoint: {0}")]
    Endpoint(String),
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;
