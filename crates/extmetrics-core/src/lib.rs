//! extmetrics-core — shared types and configuration.
//!
//! Defines the autoscaling policy shape consumed from the cluster, the
//! external metric value records produced from it, and the
//! `extmetrics.toml` configuration file.

pub mod config;
pub mod types;

pub use config::{ConfigError, ExtMetricsConfig, parse_duration};
pub use types::*;
