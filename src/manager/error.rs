//! Errors returned by lifecycle operations

use crate::model::{AdapterId, ConfigurationError};
use crate::protocol::ProtocolError;
use crate::storage::StorageError;
use thiserror::Error;

/// Always returned to the caller; the manager never panics on bad input.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("invalid adapter id: '{0}'")]
    InvalidId(String),

    #[error("adapter not found: {0}")]
    NotFound(AdapterId),

    #[error("adapter already exists: {0}")]
    AlreadyExists(AdapterId),

    #[error("adapter store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("adapter already running: {0}")]
    AlreadyRunning(AdapterId),

    #[error("adapter not running: {0}")]
    NotRunning(AdapterId),

    #[error("adapter configuration invalid: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("source error: {0}")]
    Protocol(#[from] ProtocolError),
}
