//! Protocol and ProtocolProvider contracts

use super::sampling;
use crate::format::{DataStream, Format, FormatError, Parser};
use crate::model::{
    AdapterKind, ConfigExtractor, ConfigurationError, GuessSchema, PollingSettings,
    ProtocolConfig, RawEvent, TimeUnit,
};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Errors from fetching data at a source.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode failed: {0}")]
    Format(#[from] FormatError),
}

/// How an instance delivers data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    /// Fetch on demand; the framework polls at this cadence
    Pull(PollingSettings),
    /// One continuously-open feed
    Stream,
}

impl SourceMode {
    pub fn kind(&self) -> AdapterKind {
        match self {
            Self::Pull(_) => AdapterKind::Pull,
            Self::Stream => AdapterKind::Stream,
        }
    }
}

/// Declared type of a configuration parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    FreeText,
    Numeric,
    Boolean,
}

/// A named configuration parameter a protocol accepts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigParameter {
    pub name: String,
    pub label: String,
    pub description: String,
    pub kind: ParameterKind,
    pub required: bool,
}

impl ConfigParameter {
    pub fn required(
        name: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
        kind: ParameterKind,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            description: description.into(),
            kind,
            required: true,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
        kind: ParameterKind,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, label, description, kind)
        }
    }
}

/// Metadata used to drive configuration UIs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolDescriptor {
    pub id: String,
    pub label: String,
    pub description: String,
    /// Modes an instance of this protocol can run in
    pub kinds: Vec<AdapterKind>,
    pub parameters: Vec<ConfigParameter>,
}

/// A configured source of raw bytes.
#[async_trait]
pub trait Protocol: Send + Sync {
    /// Provider id this instance was built from
    fn id(&self) -> &str;

    fn mode(&self) -> SourceMode;

    fn parser(&self) -> &dyn Parser;

    fn format(&self) -> &dyn Format;

    /// Perform exactly one fetch.
    ///
    /// Pull instances return the body of one request; stream instances
    /// return a stream that stays open until the source closes it.
    async fn get_data_from_endpoint(&self) -> Result<DataStream, ProtocolError>;

    /// Decode up to `n` records for live preview.
    async fn get_n_elements(&self, n: usize) -> Result<Vec<RawEvent>, ProtocolError> {
        sampling::n_elements(self, n).await
    }

    /// Sample the source and guess its event schema.
    async fn get_guess_schema(&self, sample_size: usize) -> Result<GuessSchema, ProtocolError> {
        sampling::guess_schema(self, sample_size).await
    }
}

/// Declares a protocol and builds instances of it.
pub trait ProtocolProvider: Send + Sync {
    fn id(&self) -> &str;

    /// Pure description of the protocol and its parameters.
    fn declare_model(&self) -> ProtocolDescriptor;

    /// Build an instance from an adapter's protocol configuration.
    fn get_instance(
        &self,
        config: &ProtocolConfig,
        parser: Arc<dyn Parser>,
        format: Arc<dyn Format>,
    ) -> Result<Arc<dyn Protocol>, ConfigurationError>;
}

/// Read the optional `interval` / `interval_unit` pair.
pub(crate) fn polling_from_config(
    config: &ConfigExtractor<'_>,
) -> Result<Option<PollingSettings>, ConfigurationError> {
    let Some(interval) = config.optional_numeric::<u64>("interval")? else {
        return Ok(None);
    };
    let unit = match config.optional("interval_unit") {
        Some(raw) => raw.parse::<TimeUnit>()?,
        None => TimeUnit::Seconds,
    };
    PollingSettings::new(interval, unit).map(Some)
}

pub(crate) fn interval_parameters() -> Vec<ConfigParameter> {
    vec![
        ConfigParameter::required(
            "interval",
            "Interval",
            "Time between two fetches.",
            ParameterKind::Numeric,
        ),
        ConfigParameter::optional(
            "interval_unit",
            "Interval unit",
            "Unit of the interval: ms, seconds, minutes, hours. Defaults to seconds.",
            ParameterKind::FreeText,
        ),
    ]
}
