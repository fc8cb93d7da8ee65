//! JSON object format

use super::traits::{strip_bom, Format, FormatError};
use crate::model::RawEvent;
use serde_json::Value;
use tracing::debug;

/// Each record is one JSON object.
///
/// Top-level null fields are treated as missing and dropped.
#[derive(Debug, Clone, Default)]
pub struct JsonFormat;

impl JsonFormat {
    pub fn new() -> Self {
        Self
    }
}

impl Format for JsonFormat {
    fn id(&self) -> &str {
        "json"
    }

    fn parse(&self, record: &[u8]) -> Result<RawEvent, FormatError> {
        let record = strip_bom(record);
        if record.iter().all(u8::is_ascii_whitespace) {
            return Err(FormatError::Empty);
        }
        match serde_json::from_slice::<Value>(record)? {
            Value::Object(mut map) => {
                map.retain(|field, value| {
                    if value.is_null() {
                        debug!(field = %field, "skipping null field");
                        false
                    } else {
                        true
                    }
                });
                Ok(map)
            }
            _ => Err(FormatError::NotAnObject),
        }
    }

    fn encode(&self, event: &RawEvent) -> Result<Vec<u8>, FormatError> {
        Ok(serde_json::to_vec(event)?)
    }
}
