//! Adapter lifecycle management
//!
//! `AdapterManager` resolves descriptions from a store, builds the protocol
//! and pipeline they describe, and owns the runtimes of running adapters.

mod error;
mod lifecycle;

pub use error::AdapterError;
pub use lifecycle::AdapterManager;
