//! Effective daemon settings: `extmetrics.toml` with command-line overrides
//! applied on top.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

use extmetrics_core::{ExtMetricsConfig, parse_duration};

const DEFAULT_DATA_DIR: &str = "/var/lib/extmetrics";

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub max_age: Option<String>,
    pub interval: Option<String>,
    pub policies: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub app_key: Option<String>,
    pub provider_timeout: Duration,
    pub max_age: Duration,
    pub bucket: Duration,
    pub interval: Duration,
    pub policies: Option<PathBuf>,
    pub data_dir: PathBuf,
}

impl Settings {
    pub fn resolve(config: &ExtMetricsConfig, overrides: &Overrides) -> anyhow::Result<Self> {
        let provider = config.provider.as_ref();

        let endpoint = match (&overrides.endpoint, provider) {
            (Some(endpoint), _) => endpoint.clone(),
            (None, Some(p)) => p.endpoint.clone(),
            (None, None) => bail!("no provider endpoint: set [provider] endpoint or --endpoint"),
        };

        let max_age = match &overrides.max_age {
            Some(s) => flag_duration("--max-age", s)?,
            None => config.max_age()?,
        };
        let interval = match &overrides.interval {
            Some(s) => flag_duration("--interval", s)?,
            None => config.interval()?,
        };
        if interval.is_zero() {
            bail!("reconciliation interval must be greater than zero");
        }

        let policies = overrides.policies.clone().or_else(|| {
            config
                .controller
                .as_ref()
                .and_then(|c| c.policies.as_ref())
                .map(PathBuf::from)
        });
        let data_dir = overrides
            .data_dir
            .clone()
            .or_else(|| {
                config
                    .state
                    .as_ref()
                    .and_then(|s| s.data_dir.as_ref())
                    .map(PathBuf::from)
            })
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        Ok(Self {
            endpoint,
            api_key: provider.and_then(|p| p.api_key.clone()),
            app_key: provider.and_then(|p| p.app_key.clone()),
            provider_timeout: config.provider_timeout()?,
            max_age,
            bucket: config.bucket()?,
            interval,
            policies,
            data_dir,
        })
    }
}

fn flag_duration(flag: &str, value: &str) -> anyhow::Result<Duration> {
    parse_duration(value).with_context(|| format!("invalid duration for {flag}: {value:?}"))
}
