//! AdapterPipeline: ordered elements terminating in a sink

use super::element::{ElementOutcome, PipelineElement, TransformError};
use super::filter::FilterElement;
use super::schema::TransformSchemaElement;
use super::transport::{Transport, TransportError};
use crate::model::{AdapterDescription, ConfigurationError, FilterOp, RawEvent, TransformRule};
use std::sync::Arc;
use thiserror::Error;

/// Terminal element: hands events to the transport under one topic.
pub struct SinkElement {
    topic: String,
    transport: Arc<dyn Transport>,
}

impl SinkElement {
    pub fn new(topic: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            topic: topic.into(),
            transport,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub async fn deliver(&self, event: &RawEvent) -> Result<(), TransportError> {
        self.transport.publish(event, &self.topic).await
    }
}

#[derive(Debug, Error)]
pub enum PipelineFailure {
    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("delivery failed: {0}")]
    Transport(#[from] TransportError),
}

/// What happened to one event.
#[derive(Debug)]
pub enum PipelineOutcome {
    Delivered,
    Dropped,
    Failed(PipelineFailure),
}

pub struct AdapterPipeline {
    elements: Vec<Box<dyn PipelineElement>>,
    sink: SinkElement,
}

fn validate(rule: &TransformRule) -> Result<(), ConfigurationError> {
    let blank = |field: &str| field.trim().is_empty() || field.split('.').any(str::is_empty);
    let fields: Vec<&str> = match rule {
        TransformRule::Rename { from, to } => vec![from.as_str(), to.as_str()],
        TransformRule::Delete { field }
        | TransformRule::Add { field, .. }
        | TransformRule::ChangeType { field, .. } => vec![field.as_str()],
        TransformRule::Filter { field, op, value } => {
            if *op != FilterOp::Exists && value.is_none() {
                return Err(ConfigurationError::InvalidRule(format!(
                    "filter on '{field}' needs a comparison value"
                )));
            }
            vec![field.as_str()]
        }
    };
    match fields.into_iter().find(|f| blank(f)) {
        Some(f) => Err(ConfigurationError::InvalidRule(format!("invalid field name '{f}'"))),
        None => Ok(()),
    }
}

impl AdapterPipeline {
    /// Build the chain from rules in declared order.
    ///
    /// Contiguous schema rules share one element; every filter gets its own.
    pub fn from_rules(rules: &[TransformRule], sink: SinkElement) -> Result<Self, ConfigurationError> {
        let mut elements: Vec<Box<dyn PipelineElement>> = Vec::new();
        let mut pending: Vec<TransformRule> = Vec::new();

        for rule in rules {
            validate(rule)?;
            if rule.is_schema_rule() {
                pending.push(rule.clone());
                continue;
            }
            if !pending.is_empty() {
                elements.push(Box::new(TransformSchemaElement::new(std::mem::take(&mut pending))));
            }
            if let TransformRule::Filter { field, op, value } = rule {
                elements.push(Box::new(FilterElement::new(field.clone(), *op, value.clone())));
            }
        }
        if !pending.is_empty() {
            elements.push(Box::new(TransformSchemaElement::new(pending)));
        }

        Ok(Self { elements, sink })
    }

    /// Build the pipeline described by an adapter, delivering to `transport`.
    pub fn for_adapter(
        description: &AdapterDescription,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigurationError> {
        Self::from_rules(
            &description.rules,
            SinkElement::new(description.sink.topic.clone(), transport),
        )
    }

    pub fn element_names(&self) -> Vec<&str> {
        self.elements.iter().map(|e| e.name()).collect()
    }

    pub fn topic(&self) -> &str {
        self.sink.topic()
    }

    /// Run every element except the sink. `None` means a filter dropped it.
    pub fn transform(&self, event: RawEvent) -> Result<Option<RawEvent>, TransformError> {
        let mut current = event;
        for element in &self.elements {
            match element.apply(current)? {
                ElementOutcome::Forward(next) => current = next,
                ElementOutcome::Dropped => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    pub async fn process(&self, event: RawEvent) -> PipelineOutcome {
        let event = match self.transform(event) {
            Ok(Some(event)) => event,
            Ok(None) => return PipelineOutcome::Dropped,
            Err(e) => return PipelineOutcome::Failed(e.into()),
        };
        match self.sink.deliver(&event).await {
            Ok(()) => PipelineOutcome::Delivered,
            Err(e) => PipelineOutcome::Failed(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RuntimeType;
    use crate::pipeline::{ChannelTransport, Envelope};
    use serde_json::json;

    fn event(value: serde_json::Value) -> RawEvent {
        value.as_object().cloned().unwrap()
    }

    fn pipeline(rules: &[TransformRule]) -> (AdapterPipeline, tokio::sync::mpsc::Receiver<Envelope>) {
        let (transport, rx) = ChannelTransport::new(16);
        let sink = SinkElement::new("out", Arc::new(transport));
        (AdapterPipeline::from_rules(rules, sink).unwrap(), rx)
    }

    #[tokio::test]
    async fn filter_observes_renamed_field() {
        let (pipeline, mut rx) = pipeline(&[
            TransformRule::Rename { from: "a".into(), to: "b".into() },
            TransformRule::Filter { field: "b".into(), op: FilterOp::Gt, value: Some(json!(10)) },
        ]);

        assert!(matches!(pipeline.process(event(json!({"a": 42}))).await, PipelineOutcome::Delivered));
        assert!(matches!(pipeline.process(event(json!({"a": 3}))).await, PipelineOutcome::Dropped));

        let delivered = rx.recv().await.unwrap();
        assert_eq!(delivered.event, event(json!({"b": 42})));
        assert_eq!(delivered.topic, "out");
    }

    #[tokio::test]
    async fn transform_error_aborts_only_that_event() {
        let (pipeline, mut rx) = pipeline(&[TransformRule::ChangeType {
            field: "v".into(),
            to: RuntimeType::Float,
        }]);

        assert!(matches!(
            pipeline.process(event(json!({"v": "n/a"}))).await,
            PipelineOutcome::Failed(PipelineFailure::Transform(_))
        ));
        assert!(matches!(pipeline.process(event(json!({"v": "2"}))).await, PipelineOutcome::Delivered));
        assert_eq!(rx.recv().await.unwrap().event, event(json!({"v": 2.0})));
    }

    #[tokio::test]
    async fn closed_transport_fails_delivery() {
        let (pipeline, rx) = pipeline(&[]);
        drop(rx);
        assert!(matches!(
            pipeline.process(event(json!({"a": 1}))).await,
            PipelineOutcome::Failed(PipelineFailure::Transport(TransportError::Closed))
        ));
    }

    #[test]
    fn contiguous_schema_rules_share_an_element() {
        let (pipeline, _rx) = pipeline(&[
            TransformRule::Rename { from: "a".into(), to: "b".into() },
            TransformRule::Delete { field: "c".into() },
            TransformRule::Filter { field: "b".into(), op: FilterOp::Exists, value: None },
            TransformRule::Add { field: "d".into(), value: json!(1) },
        ]);
        assert_eq!(
            pipeline.element_names(),
            vec!["transform_schema", "filter", "transform_schema"]
        );
    }

    #[test]
    fn invalid_rules_fail_construction() {
        let (transport, _rx) = ChannelTransport::new(1);
        let transport: Arc<dyn Transport> = Arc::new(transport);
        let cases = [
            TransformRule::Delete { field: " ".into() },
            TransformRule::Rename { from: "a..b".into(), to: "c".into() },
            TransformRule::Filter { field: "a".into(), op: FilterOp::Eq, value: None },
        ];
        for rule in cases {
            let sink = SinkElement::new("out", transport.clone());
            assert!(matches!(
                AdapterPipeline::from_rules(&[rule], sink),
                Err(ConfigurationError::InvalidRule(_))
            ));
        }
    }
}
