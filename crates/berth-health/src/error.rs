//! Error types for target health tracking.

use thiserror::Error;

pub type HealthResult<T> = Result<T, HealthError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HealthError {
    #[error("unknown target: {0}")]
    UnknownTarget(String),

    #[error("target already registered: {0}")]
    AlreadyRegistered(String),
}
