//! PipelineElement contract and transform errors

use crate::model::{RawEvent, RuntimeType};
use thiserror::Error;

/// A rule could not be applied to one event. Only that event is aborted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    #[error("cannot convert field '{field}' value {value} to {to:?}")]
    Conversion {
        field: String,
        value: String,
        to: RuntimeType,
    },

    #[error("cannot write field '{0}': a parent segment is not an object")]
    PathConflict(String),
}

/// Result of one element applied to one event.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementOutcome {
    /// Pass the (possibly rewritten) event to the next element
    Forward(RawEvent),
    /// A filter vetoed the event
    Dropped,
}

/// One stage of an adapter's processing chain.
pub trait PipelineElement: Send + Sync {
    /// Short label used in logs
    fn name(&self) -> &str;

    fn apply(&self, event: RawEvent) -> Result<ElementOutcome, TransformError>;
}
