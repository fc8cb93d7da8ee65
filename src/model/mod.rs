//! Core data model: adapter descriptors, schemas, and events

mod config;
mod description;
mod event;
mod polling;
mod schema;

pub use config::{ConfigExtractor, ConfigurationError};
pub use description::{
    AdapterDescription, AdapterId, AdapterKind, ConfigValue, FilterOp, FormatConfig,
    ParserConfig, ProtocolConfig, SinkDescriptor, TransformRule,
};
pub use event::{get_path, insert_path, remove_path, RawEvent};
pub use polling::{PollingSettings, TimeUnit};
pub use schema::{EventProperty, EventSchema, GuessSchema, PropertyScope, RuntimeType};
