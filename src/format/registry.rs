//! Registry of parsers and formats, keyed by id

use super::delimited::CsvFormat;
use super::framing::{JsonArrayParser, LengthPrefixedParser, LineParser};
use super::json::JsonFormat;
use super::traits::{Format, Parser};
use crate::model::{ConfigExtractor, ConfigurationError, FormatConfig, ParserConfig};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds a parser from its configuration.
pub type ParserFactory = fn(&ConfigExtractor<'_>) -> Result<Arc<dyn Parser>, ConfigurationError>;

/// Builds a format from its configuration.
pub type FormatFactory = fn(&ConfigExtractor<'_>) -> Result<Arc<dyn Format>, ConfigurationError>;

/// Resolves parser and format ids from adapter descriptions.
///
/// Registering an id twice replaces the earlier factory.
#[derive(Clone, Default)]
pub struct FormatRegistry {
    parsers: BTreeMap<String, ParserFactory>,
    formats: BTreeMap<String, FormatFactory>,
}

impl FormatRegistry {
    /// Create an empty registry.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the built-in parsers (`lines`, `json_array`,
    /// `length_prefixed`) and formats (`json`, `csv`).
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register_parser("lines", |c| Ok(Arc::new(LineParser::from_config(c)?)));
        registry.register_parser("json_array", |c| Ok(Arc::new(JsonArrayParser::from_config(c)?)));
        registry.register_parser("length_prefixed", |c| {
            Ok(Arc::new(LengthPrefixedParser::from_config(c)?))
        });
        registry.register_format("json", |_| Ok(Arc::new(JsonFormat::new())));
        registry.register_format("csv", |c| Ok(Arc::new(CsvFormat::from_config(c)?)));
        registry
    }

    pub fn register_parser(&mut self, id: impl Into<String>, factory: ParserFactory) {
        self.parsers.insert(id.into(), factory);
    }

    pub fn register_format(&mut self, id: impl Into<String>, factory: FormatFactory) {
        self.formats.insert(id.into(), factory);
    }

    pub fn parser(&self, config: &ParserConfig) -> Result<Arc<dyn Parser>, ConfigurationError> {
        let factory = self
            .parsers
            .get(&config.id)
            .ok_or_else(|| ConfigurationError::UnknownParser(config.id.clone()))?;
        factory(&ConfigExtractor::new(&config.config))
    }

    pub fn format(&self, config: &FormatConfig) -> Result<Arc<dyn Format>, ConfigurationError> {
        let factory = self
            .formats
            .get(&config.id)
            .ok_or_else(|| ConfigurationError::UnknownFormat(config.id.clone()))?;
        factory(&ConfigExtractor::new(&config.config))
    }

    pub fn parser_ids(&self) -> Vec<&str> {
        self.parsers.keys().map(String::as_str).collect()
    }

    pub fn format_ids(&self) -> Vec<&str> {
        self.formats.keys().map(String::as_str).collect()
    }
}
