//! extmetrics.toml configuration parser.
//!
//! Every section is optional. Durations are written as strings such as
//! `"120s"`, `"5m"` or `"500ms"`; a bare number is read as seconds.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid duration for {field}: {value:?}")]
    Duration { field: &'static str, value: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtMetricsConfig {
    pub provider: Option<ProviderConfig>,
    pub processor: Option<ProcessorConfig>,
    pub controller: Option<ControllerConfig>,
    pub state: Option<StateConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the metrics query API, e.g. `http://127.0.0.1:8080`.
    pub endpoint: String,
    pub api_key: Option<String>,
    pub app_key: Option<String>,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Maximum age of a valid value before it is revalidated.
    pub max_age: Option<String>,
    /// Width of the query window ending at "now".
    pub bucket: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Reconciliation tick interval.
    pub interval: Option<String>,
    /// Path to the JSON list of autoscaling policies.
    pub policies: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    pub data_dir: Option<String>,
}

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(120);
pub const DEFAULT_BUCKET: Duration = Duration::from_secs(300);
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

impl ExtMetricsConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn max_age(&self) -> Result<Duration, ConfigError> {
        let value = self.processor.as_ref().and_then(|p| p.max_age.as_deref());
        duration_or("processor.max_age", value, DEFAULT_MAX_AGE)
    }

    pub fn bucket(&self) -> Result<Duration, ConfigError> {
        let value = self.processor.as_ref().and_then(|p| p.bucket.as_deref());
        duration_or("processor.bucket", value, DEFAULT_BUCKET)
    }

    pub fn interval(&self) -> Result<Duration, ConfigError> {
        let value = self.controller.as_ref().and_then(|c| c.interval.as_deref());
        duration_or("controller.interval", value, DEFAULT_INTERVAL)
    }

    pub fn provider_timeout(&self) -> Result<Duration, ConfigError> {
        let value = self.provider.as_ref().and_then(|p| p.timeout.as_deref());
        duration_or("provider.timeout", value, DEFAULT_PROVIDER_TIMEOUT)
    }
}

fn duration_or(
    field: &'static str,
    value: Option<&str>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(default),
        Some(s) => parse_duration(s).ok_or_else(|| ConfigError::Duration {
            field,
            value: s.to_string(),
        }),
    }
}

/// Parse a duration string like "30s", "500ms", "5m" or "1h".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else if let Some(hours) = s.strip_suffix('h') {
        hours
            .parse::<u64>()
            .ok()
            .and_then(|h| h.checked_mul(3600))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
