//! Schema guessing: combine an inferred schema with sample records

use crate::model::{EventSchema, GuessSchema, RawEvent};
use serde_json::Value;
use std::collections::BTreeMap;

/// Distinct example values kept per field.
const MAX_FIELD_EXAMPLES: usize = 3;

/// Pure, deterministic combination of schema and samples.
pub struct SchemaGuesser;

impl SchemaGuesser {
    /// Build a `GuessSchema` for user review.
    ///
    /// `sample_size` is what was requested; `samples` is what the source
    /// yielded. A short sample marks the result degraded but never fails.
    pub fn guess(event_schema: EventSchema, samples: Vec<RawEvent>, sample_size: usize) -> GuessSchema {
        let mut field_examples: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        for property in &event_schema.properties {
            let name = property.runtime_name();
            let mut values: Vec<Value> = Vec::new();
            for sample in &samples {
                if values.len() >= MAX_FIELD_EXAMPLES {
                    break;
                }
                if let Some(v) = sample.get(name) {
                    if !values.contains(v) {
                        values.push(v.clone());
                    }
                }
            }
            field_examples.insert(name.to_string(), values);
        }

        let records_available = samples.len();
        GuessSchema {
            event_schema,
            examples: samples,
            field_examples,
            sample_size,
            records_available,
            degraded: records_available < sample_size,
        }
    }
}
