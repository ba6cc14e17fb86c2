//! Error types for topology construction.

use thiserror::Error;

/// Result type alias for topology operations.
pub type TopologyResult<T> = Result<T, TopologyError>;

/// Errors raised while loading or validating a topology.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("invalid health check policy: {0}")]
    InvalidPolicy(String),

    #[error("invalid network: {0}")]
    InvalidNetwork(String),

    #[error("invalid ports: {0}")]
    InvalidPorts(String),

    #[error("invalid capacity: {0}")]
    InvalidCapacity(String),

    #[error("invalid secret reference: {0}")]
    InvalidSecret(String),

    #[error("invalid listener: {0}")]
    InvalidListener(String),

    #[error("invalid environment: {0}")]
    InvalidEnv(String),

    #[error("invalid topology: {0}")]
    Invalid(String),

    #[error("failed to parse topology file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize topology: {0}")]
    Serialize(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
