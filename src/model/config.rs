//! Typed access to ordered key→value configuration lists

use super::description::ConfigValue;
use std::str::FromStr;
use thiserror::Error;

/// A configuration value is missing or does not parse as its declared type.
///
/// Raised while constructing protocols, parsers, formats, and pipelines.
/// Construction aborts and the adapter is never scheduled.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("missing required parameter '{0}'")]
    Missing(String),

    #[error("parameter '{key}' = '{value}' is not a valid {expected}")]
    Invalid {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),

    #[error("unknown parser: {0}")]
    UnknownParser(String),

    #[error("unknown format: {0}")]
    UnknownFormat(String),

    #[error("invalid rule: {0}")]
    InvalidRule(String),

    #[error("adapter declared as {declared} but protocol '{protocol}' runs as {actual}")]
    KindMismatch {
        protocol: String,
        declared: String,
        actual: String,
    },
}

/// Read-only view over a configuration list.
///
/// Duplicate keys resolve to the last occurrence.
pub struct ConfigExtractor<'a> {
    values: &'a [ConfigValue],
}

impl<'a> ConfigExtractor<'a> {
    pub fn new(values: &'a [ConfigValue]) -> Self {
        Self { values }
    }

    /// The raw value for `key`, if present and not blank.
    pub fn optional(&self, key: &str) -> Option<&'a str> {
        self.values
            .iter()
            .rev()
            .find(|v| v.key == key)
            .map(|v| v.value.trim())
            .filter(|v| !v.is_empty())
    }

    /// The raw value for `key`, failing if absent.
    pub fn single_value(&self, key: &str) -> Result<&'a str, ConfigurationError> {
        self.optional(key)
            .ok_or_else(|| ConfigurationError::Missing(key.to_string()))
    }

    /// A required numeric value.
    pub fn numeric<T: FromStr>(&self, key: &str) -> Result<T, ConfigurationError> {
        let raw = self.single_value(key)?;
        raw.parse().map_err(|_| ConfigurationError::Invalid {
            key: key.to_string(),
            value: raw.to_string(),
            expected: "number",
        })
    }

    /// An optional numeric value; present-but-unparseable is still an error.
    pub fn optional_numeric<T: FromStr>(&self, key: &str) -> Result<Option<T>, ConfigurationError> {
        match self.optional(key) {
            Some(_) => self.numeric(key).map(Some),
            None => Ok(None),
        }
    }

    /// An optional boolean (`true`/`false`, case-insensitive), defaulting when absent.
    pub fn flag(&self, key: &str, default: bool) -> Result<bool, ConfigurationError> {
        match self.optional(key) {
            None => Ok(default),
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(ConfigurationError::Invalid {
                    key: key.to_string(),
                    value: raw.to_string(),
                    expected: "boolean",
                }),
            },
        }
    }
}
