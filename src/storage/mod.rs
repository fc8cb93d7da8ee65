//! Storage backends for adapter descriptions
//!
//! The lifecycle manager reads descriptions through the `AdapterStore`
//! trait. The shipped implementation is `SqliteStore`.

mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{AdapterStore, OpenStore, StorageError, StorageResult};
