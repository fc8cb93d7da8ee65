//! Filter element: drops events that fail a comparison

use super::element::{ElementOutcome, PipelineElement, TransformError};
use crate::model::{get_path, FilterOp, RawEvent};
use serde_json::Value;
use std::cmp::Ordering;

pub struct FilterElement {
    field: String,
    op: FilterOp,
    value: Option<Value>,
}

impl FilterElement {
    pub fn new(field: impl Into<String>, op: FilterOp, value: Option<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }

    /// Whether `event` passes. A missing field never passes.
    pub fn matches(&self, event: &RawEvent) -> bool {
        let Some(actual) = get_path(event, &self.field) else {
            return false;
        };
        if self.op == FilterOp::Exists {
            return true;
        }
        let Some(expected) = &self.value else {
            return false;
        };
        match self.op {
            FilterOp::Eq => loosely_equal(actual, expected),
            FilterOp::Ne => !loosely_equal(actual, expected),
            FilterOp::Gt => compare(actual, expected) == Some(Ordering::Greater),
            FilterOp::Ge => matches!(compare(actual, expected), Some(Ordering::Greater | Ordering::Equal)),
            FilterOp::Lt => compare(actual, expected) == Some(Ordering::Less),
            FilterOp::Le => matches!(compare(actual, expected), Some(Ordering::Less | Ordering::Equal)),
            FilterOp::Contains => contains(actual, expected),
            FilterOp::Exists => true,
        }
    }
}

/// Numbers compare by value, so `1` equals `1.0`.
fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match (haystack, needle) {
        (Value::String(h), Value::String(n)) => h.contains(n.as_str()),
        (Value::Array(items), n) => items.iter().any(|item| loosely_equal(item, n)),
        _ => false,
    }
}

impl PipelineElement for FilterElement {
    fn name(&self) -> &str {
        "filter"
    }

    fn apply(&self, event: RawEvent) -> Result<ElementOutcome, TransformError> {
        if self.matches(&event) {
            Ok(ElementOutcome::Forward(event))
        } else {
            Ok(ElementOutcome::Dropped)
        }
    }
}
