//! Pipeline: per-event transforms ending in a sink
//!
//! Rules from an adapter description become an ordered chain of elements.
//! Each event either reaches the transport, is dropped by a filter, or fails
//! on its own without affecting its siblings.

mod chain;
mod element;
mod filter;
mod schema;
mod transport;

pub use chain::{AdapterPipeline, PipelineFailure, PipelineOutcome, SinkElement};
pub use element::{ElementOutcome, PipelineElement, TransformError};
pub use filter::FilterElement;
pub use schema::TransformSchemaElement;
pub use transport::{ChannelTransport, Envelope, Transport, TransportError, WriterTransport};
