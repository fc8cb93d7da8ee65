//! Sluice: adapter execution framework for event ingestion
//!
//! Connects heterogeneous data sources to a uniform event pipeline. An
//! adapter binds a protocol (how bytes are fetched), a parser and format
//! (how bytes become events), and an ordered list of transform rules,
//! delivering every surviving event to a downstream transport.
//!
//! # Core Concepts
//!
//! - **Pull adapters**: the framework polls the source at a fixed interval
//! - **Stream adapters**: one long-lived feed consumed until stop
//! - **Descriptions**: the persisted configuration of an adapter
//! - **Manager**: starts, stops, and edits adapters by id
//!
//! # Example
//!
//! ```
//! use sluice::{AdapterManager, ChannelTransport, Settings};
//! use std::sync::Arc;
//!
//! let (transport, _events) = ChannelTransport::new(64);
//! let manager = AdapterManager::from_settings(&Settings::default(), Arc::new(transport)).unwrap();
//! assert!(manager.declared_protocols().iter().any(|p| p.id == "http"));
//! ```

pub mod config;
pub mod format;
mod guess;
pub mod manager;
pub mod model;
pub mod pipeline;
pub mod protocol;
pub mod runtime;
pub mod storage;

#[cfg(test)]
mod testing;

pub use config::{HttpSettings, Settings, SettingsError};
pub use guess::SchemaGuesser;
pub use manager::{AdapterError, AdapterManager};
pub use model::{
    AdapterDescription, AdapterId, AdapterKind, ConfigValue, ConfigurationError, EventSchema,
    GuessSchema, RawEvent, TransformRule,
};
pub use pipeline::{ChannelTransport, Envelope, Transport, TransportError, WriterTransport};
pub use protocol::{Protocol, ProtocolDescriptor, ProtocolError, ProtocolProvider, ProtocolRegistry};
pub use runtime::{RuntimeStatus, SchedulerState, StatsSnapshot};
pub use storage::{AdapterStore, OpenStore, SqliteStore, StorageError, StorageResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
