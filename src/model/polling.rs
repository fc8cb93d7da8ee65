//! Polling cadence for pull adapters

use super::config::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Time granularity of a polling interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
}

impl std::str::FromStr for TimeUnit {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ms" | "millis" | "milliseconds" => Ok(Self::Milliseconds),
            "s" | "sec" | "secs" | "seconds" => Ok(Self::Seconds),
            "m" | "min" | "minutes" => Ok(Self::Minutes),
            "h" | "hours" => Ok(Self::Hours),
            _ => Err(ConfigurationError::Invalid {
                key: "interval_unit".to_string(),
                value: s.to_string(),
                expected: "time unit",
            }),
        }
    }
}

/// A fixed pull cadence. The value is always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPolling")]
pub struct PollingSettings {
    value: u64,
    unit: TimeUnit,
}

#[derive(Deserialize)]
struct RawPolling {
    value: u64,
    unit: TimeUnit,
}

impl TryFrom<RawPolling> for PollingSettings {
    type Error = ConfigurationError;

    fn try_from(raw: RawPolling) -> Result<Self, Self::Error> {
        Self::new(raw.value, raw.unit)
    }
}

impl PollingSettings {
    pub fn new(value: u64, unit: TimeUnit) -> Result<Self, ConfigurationError> {
        if value == 0 {
            return Err(ConfigurationError::Invalid {
                key: "interval".to_string(),
                value: value.to_string(),
                expected: "positive interval",
            });
        }
        Ok(Self { value, unit })
    }

    pub fn seconds(value: u64) -> Result<Self, ConfigurationError> {
        Self::new(value, TimeUnit::Seconds)
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub fn as_duration(&self) -> Duration {
        match self.unit {
            TimeUnit::Milliseconds => Duration::from_millis(self.value),
            TimeUnit::Seconds => Duration::from_secs(self.value),
            TimeUnit::Minutes => Duration::from_secs(self.value.saturating_mul(60)),
            TimeUnit::Hours => Duration::from_secs(self.value.saturating_mul(3600)),
        }
    }
}
