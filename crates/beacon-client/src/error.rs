//! Client construction and configuration errors

use beacon_transport::TransportError;
use thiserror::Error;

/// Malformed or missing configuration. Fatal at startup; nothing in the
/// running client produces this.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A required field is missing or inconsistent
    #[error("invalid configuration: {0}")]
    Validation(String),

    /// The local host address could not be resolved
    #[error("could not resolve a local address: {0}")]
    LocalAddress(String),

    /// The registry endpoint was rejected while building the transport
    #[error(transparent)]
    Transport(#[from] TransportError),
}
