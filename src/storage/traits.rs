//! Storage trait definitions

use crate::model::{AdapterDescription, AdapterId};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persisted collection of adapter descriptions.
///
/// Implementations must be thread-safe (Send + Sync); the manager shares
/// one store across all lifecycle calls.
pub trait AdapterStore: Send + Sync {
    /// The full collection, or `None` when the backing collection is absent.
    fn get_all_adapters(&self) -> StorageResult<Option<Vec<AdapterDescription>>>;

    /// Insert or replace by id. The original creation time is preserved.
    fn save_adapter(&self, description: &AdapterDescription) -> StorageResult<()>;

    /// Remove by id. Returns whether a row existed.
    fn delete_adapter(&self, id: &AdapterId) -> StorageResult<bool>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: AdapterStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
