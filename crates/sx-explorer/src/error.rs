//! Explorer error types.

use thiserror::Error;

/// Errors that can occur in the shadow session engine.
#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error("invalid thing name: {0}")]
    ThingName(String),

    #[error("state file error: {0}")]
    StateFile(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("mqtt error: {0}")]
    Mqtt(String),

    #[error("{0}")]
    Other(String),
}

/// Convenience alias for explorer results.
pub type ExplorerResult<T> = Result<T, ExplorerError>;
