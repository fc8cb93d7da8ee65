//! Event schemas and structural type inference

use super::event::RawEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Primitive runtime type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    String,
    Integer,
    Float,
    Boolean,
}

/// Identifying (tag-like) vs value field. Consumed later by the time-series store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyScope {
    Dimension,
    Measurement,
}

impl PropertyScope {
    /// Default scope for a runtime type: strings identify, everything else measures.
    pub fn for_type(runtime_type: RuntimeType) -> Self {
        match runtime_type {
            RuntimeType::String => Self::Dimension,
            _ => Self::Measurement,
        }
    }
}

/// One field of an event schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventProperty {
    Primitive {
        runtime_name: String,
        runtime_type: RuntimeType,
        scope: PropertyScope,
    },
    List {
        runtime_name: String,
        item: Box<EventProperty>,
    },
    Nested {
        runtime_name: String,
        properties: Vec<EventProperty>,
    },
}

impl EventProperty {
    pub fn runtime_name(&self) -> &str {
        match self {
            Self::Primitive { runtime_name, .. }
            | Self::List { runtime_name, .. }
            | Self::Nested { runtime_name, .. } => runtime_name,
        }
    }
}

/// Ordered list of event properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSchema {
    pub properties: Vec<EventProperty>,
}

impl EventSchema {
    pub fn new(properties: Vec<EventProperty>) -> Self {
        Self { properties }
    }

    /// Infer a schema from decoded records.
    ///
    /// Fields are ordered by name. Integer and float observations of one field
    /// merge to float; any other conflict widens to string. Fields only ever
    /// observed as null are omitted.
    pub fn infer(records: &[RawEvent]) -> Self {
        let mut fields: BTreeMap<String, Shape> = BTreeMap::new();
        for record in records {
            for (name, value) in record {
                let observed = Shape::of(value);
                let merged = match fields.remove(name) {
                    Some(existing) => existing.merge(observed),
                    None => observed,
                };
                fields.insert(name.clone(), merged);
            }
        }
        Self {
            properties: fields
                .into_iter()
                .filter_map(|(name, shape)| shape.into_property(name))
                .collect(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&EventProperty> {
        self.properties.iter().find(|p| p.runtime_name() == name)
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Result of schema guessing, offered to a user for confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuessSchema {
    pub event_schema: EventSchema,
    /// The decoded sample records
    pub examples: Vec<RawEvent>,
    /// Up to three distinct example values per top-level field
    pub field_examples: BTreeMap<String, Vec<Value>>,
    /// Number of records requested
    pub sample_size: usize,
    /// Number of records the source actually yielded
    pub records_available: usize,
    /// True when fewer records than requested were available
    pub degraded: bool,
}

/// Structural shape accumulated while inferring.
#[derive(Debug, Clone, PartialEq)]
enum Shape {
    Unknown,
    Primitive(RuntimeType),
    List(Box<Shape>),
    Nested(BTreeMap<String, Shape>),
}

impl Shape {
    fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Unknown,
            Value::Bool(_) => Self::Primitive(RuntimeType::Boolean),
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Primitive(RuntimeType::Integer),
            Value::Number(_) => Self::Primitive(RuntimeType::Float),
            Value::String(_) => Self::Primitive(RuntimeType::String),
            Value::Array(items) => Self::List(Box::new(
                items
                    .iter()
                    .map(Self::of)
                    .fold(Self::Unknown, Self::merge),
            )),
            Value::Object(map) => Self::Nested(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::of(v)))
                    .collect(),
            ),
        }
    }

    fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Unknown, s) | (s, Self::Unknown) => s,
            (Self::Primitive(a), Self::Primitive(b)) => Self::Primitive(widen(a, b)),
            (Self::List(a), Self::List(b)) => Self::List(Box::new(a.merge(*b))),
            (Self::Nested(mut a), Self::Nested(b)) => {
                for (k, v) in b {
                    let merged = match a.remove(&k) {
                        Some(existing) => existing.merge(v),
                        None => v,
                    };
                    a.insert(k, merged);
                }
                Self::Nested(a)
            }
            _ => Self::Primitive(RuntimeType::String),
        }
    }

    fn into_property(self, runtime_name: String) -> Option<EventProperty> {
        match self {
            Self::Unknown => None,
            Self::Primitive(t) => Some(EventProperty::Primitive {
                runtime_name,
                runtime_type: t,
                scope: PropertyScope::for_type(t),
            }),
            Self::List(item) => {
                let item_shape = match *item {
                    Self::Unknown => Self::Primitive(RuntimeType::String),
                    s => s,
                };
                let item = item_shape.into_property(runtime_name.clone())?;
                Some(EventProperty::List {
                    runtime_name,
                    item: Box::new(item),
                })
            }
            Self::Nested(children) => Some(EventProperty::Nested {
                runtime_name,
                properties: children
                    .into_iter()
                    .filter_map(|(name, shape)| shape.into_property(name))
                    .collect(),
            }),
        }
    }
}

fn widen(a: RuntimeType, b: RuntimeType) -> RuntimeType {
    use RuntimeType::*;
    match (a, b) {
        (x, y) if x == y => x,
        (Integer, Float) | (Float, Integer) => Float,
        _ => String,
    }
}
