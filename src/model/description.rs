//! AdapterDescription: the persisted, declarative configuration of an adapter

use super::schema::RuntimeType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Unique identifier for an adapter
///
/// Serializes as a plain string. Equality is exact string match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdapterId(String);

impl AdapterId {
    /// Create a new random AdapterId (UUID-based)
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create an AdapterId from a string
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the id is empty or whitespace only
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Default for AdapterId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AdapterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AdapterId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AdapterId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Whether the adapter's source is polled or continuously streamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    /// Long-lived feed consumed until stop
    Stream,
    /// Fetched on a fixed interval ("specific" adapters)
    #[serde(alias = "specific")]
    Pull,
}

impl std::fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream => write!(f, "stream"),
            Self::Pull => write!(f, "pull"),
        }
    }
}

/// A single configuration parameter value, in textual form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValue {
    pub key: String,
    pub value: String,
}

impl ConfigValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Protocol selection and its ordered configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    pub id: String,
    #[serde(default)]
    pub config: Vec<ConfigValue>,
}

/// Framing (parser) selection and its configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserConfig {
    pub id: String,
    #[serde(default)]
    pub config: Vec<ConfigValue>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            id: "lines".to_string(),
            config: Vec::new(),
        }
    }
}

/// Encoding (format) selection and its configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatConfig {
    pub id: String,
    #[serde(default)]
    pub config: Vec<ConfigValue>,
}

/// Where processed events are delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkDescriptor {
    pub topic: String,
}

/// Comparison used by filter rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Exists,
    Contains,
}

/// A transform rule applied to every event, in declared order.
///
/// Field names may be dotted paths (`location.lat`) addressing nested fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformRule {
    Rename { from: String, to: String },
    Delete { field: String },
    Add { field: String, value: Value },
    ChangeType { field: String, to: RuntimeType },
    Filter {
        field: String,
        op: FilterOp,
        #[serde(default)]
        value: Option<Value>,
    },
}

impl TransformRule {
    /// True for rules that rewrite the event (everything except filters)
    pub fn is_schema_rule(&self) -> bool {
        !matches!(self, Self::Filter { .. })
    }
}

fn default_parser() -> ParserConfig {
    ParserConfig::default()
}

/// The persisted, declarative configuration of an adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterDescription {
    pub id: AdapterId,
    #[serde(default)]
    pub name: String,
    pub kind: AdapterKind,
    pub protocol: ProtocolConfig,
    #[serde(default = "default_parser")]
    pub parser: ParserConfig,
    pub format: FormatConfig,
    #[serde(default)]
    pub rules: Vec<TransformRule>,
    pub sink: SinkDescriptor,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl AdapterDescription {
    /// Create a description with the default `lines` parser and no rules
    pub fn new(
        id: impl Into<AdapterId>,
        kind: AdapterKind,
        protocol: ProtocolConfig,
        format: FormatConfig,
        topic: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            kind,
            protocol,
            parser: ParserConfig::default(),
            format,
            rules: Vec::new(),
            sink: SinkDescriptor {
                topic: topic.into(),
            },
            created_at: Some(Utc::now()),
            updated_at: None,
        }
    }

    pub fn with_parser(mut self, parser: ParserConfig) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_rule(mut self, rule: TransformRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}
