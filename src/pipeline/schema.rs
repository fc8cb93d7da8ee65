//! Schema transform: rename, delete, add, and change_type rules

use super::element::{ElementOutcome, PipelineElement, TransformError};
use crate::model::{get_path, insert_path, remove_path, RawEvent, RuntimeType, TransformRule};
use serde_json::{Number, Value};
use tracing::debug;

/// A contiguous run of schema rules, applied in declared order.
pub struct TransformSchemaElement {
    rules: Vec<TransformRule>,
}

impl TransformSchemaElement {
    pub fn new(rules: Vec<TransformRule>) -> Self {
        Self { rules }
    }

    fn apply_rule(rule: &TransformRule, event: &mut RawEvent) -> Result<(), TransformError> {
        match rule {
            TransformRule::Rename { from, to } => {
                let Some(value) = remove_path(event, from) else {
                    debug!(field = %from, "rename source missing, skipping");
                    return Ok(());
                };
                if !insert_path(event, to, value) {
                    return Err(TransformError::PathConflict(to.clone()));
                }
            }
            TransformRule::Delete { field } => {
                if remove_path(event, field).is_none() {
                    debug!(field = %field, "delete target missing, skipping");
                }
            }
            TransformRule::Add { field, value } => {
                if !insert_path(event, field, value.clone()) {
                    return Err(TransformError::PathConflict(field.clone()));
                }
            }
            TransformRule::ChangeType { field, to } => {
                let Some(current) = get_path(event, field) else {
                    debug!(field = %field, "change_type target missing, skipping");
                    return Ok(());
                };
                let converted = convert(current, *to).ok_or_else(|| TransformError::Conversion {
                    field: field.clone(),
                    value: current.to_string(),
                    to: *to,
                })?;
                insert_path(event, field, converted);
            }
            TransformRule::Filter { .. } => {}
        }
        Ok(())
    }
}

fn convert(value: &Value, to: RuntimeType) -> Option<Value> {
    match to {
        RuntimeType::String => match value {
            Value::String(_) => Some(value.clone()),
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
        RuntimeType::Integer => {
            let i = match value {
                Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
                Value::String(s) => {
                    let s = s.trim();
                    s.parse::<i64>()
                        .ok()
                        .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
                }
                Value::Bool(b) => Some(i64::from(*b)),
                _ => None,
            }?;
            Some(Value::Number(i.into()))
        }
        RuntimeType::Float => {
            let f = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                _ => None,
            }?;
            Number::from_f64(f).map(Value::Number)
        }
        RuntimeType::Boolean => match value {
            Value::Bool(_) => Some(value.clone()),
            Value::Number(n) => n.as_f64().map(|f| Value::Bool(f != 0.0)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
    }
}

impl PipelineElement for TransformSchemaElement {
    fn name(&self) -> &str {
        "transform_schema"
    }

    fn apply(&self, mut event: RawEvent) -> Result<ElementOutcome, TransformError> {
        for rule in &self.rules {
            Self::apply_rule(rule, &mut event)?;
        }
        Ok(ElementOutcome::Forward(event))
    }
}
