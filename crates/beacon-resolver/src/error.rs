//! Resolver error types

use beacon_transport::TransportError;
use thiserror::Error;

/// Failures resolving a logical name to a concrete endpoint.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Application or address set is empty after a fresh fetch attempt.
    /// Never retried internally.
    #[error("not found: {0}")]
    NotFound(String),

    /// Logical URL does not carry a known scheme and application segment
    #[error("invalid logical URL: {0}")]
    InvalidUrl(String),

    /// The on-miss fetch failed
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result type for resolver operations
pub type ResolveResult<T> = Result<T, ResolveError>;
