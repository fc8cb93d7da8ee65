//! Protocol layer: how raw bytes are obtained from a source
//!
//! A `ProtocolProvider` declares a protocol's configuration model and builds
//! `Protocol` instances from an adapter's configuration. Instances either run
//! in pull mode (the framework schedules fetches) or stream mode (one
//! long-lived feed).

mod file;
mod http;
mod registry;
mod sampling;
mod traits;

pub use file::{FileProtocol, FileProvider};
pub use http::{HttpPullProtocol, HttpPullProvider, HttpStreamProtocol, HttpStreamProvider};
pub use registry::ProtocolRegistry;
pub use sampling::{guess_schema, n_elements, SAMPLE_TIMEOUT};
pub use traits::{
    ConfigParameter, ParameterKind, Protocol, ProtocolDescriptor, ProtocolError, ProtocolProvider,
    SourceMode,
};
