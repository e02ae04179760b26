//! extmetricsd — the external metrics daemon.
//!
//! Keeps the external metric values declared by autoscaling policies fresh:
//! - Record store (redb)
//! - Provider client (HTTP)
//! - Processor + reconciliation controller
//!
//! # Usage
//!
//! ```text
//! extmetricsd run --config /etc/extmetrics/extmetrics.toml --policies policies.json
//! extmetricsd query --endpoint http://127.0.0.1:8080 --metric nginx.net.request_per_s --label role=web
//! ```

mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use extmetrics_core::{ExtMetricsConfig, Labels};
use extmetrics_hpa::{Controller, FilePolicySource, Processor, Validator, epoch_secs};
use extmetrics_provider::HttpMetricsClient;
use extmetrics_state::StateStore;

use crate::settings::{Overrides, Settings};

const DEFAULT_LOG_FILTER: &str =
    "info,extmetricsd=debug,extmetrics_hpa=debug,extmetrics_state=debug,extmetrics_provider=debug";

#[derive(Parser)]
#[command(name = "extmetricsd", about = "External metrics daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Common {
    /// Path to extmetrics.toml.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Metrics provider endpoint (overrides [provider] endpoint).
    #[arg(long)]
    endpoint: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the reconciliation loop until interrupted.
    Run {
        #[command(flatten)]
        common: Common,

        /// JSON file listing the autoscaling policies.
        #[arg(long)]
        policies: Option<PathBuf>,

        /// Data directory for the record store.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Maximum age of a valid value, e.g. "120s".
        #[arg(long)]
        max_age: Option<String>,

        /// Reconciliation interval, e.g. "30s".
        #[arg(long)]
        interval: Option<String>,
    },
    /// Validate one external metric against the provider and print it.
    Query {
        #[command(flatten)]
        common: Common,

        /// Metric name.
        #[arg(long)]
        metric: String,

        /// Label selector entry as key=value; repeatable.
        #[arg(long = "label", value_parser = parse_label)]
        labels: Vec<(String, String)>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)
            }),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            common,
            policies,
            data_dir,
            max_age,
            interval,
        } => {
            let overrides = Overrides {
                endpoint: common.endpoint,
                max_age,
                interval,
                policies,
                data_dir,
            };
            let settings = Settings::resolve(&load_config(common.config.as_ref())?, &overrides)?;
            run_daemon(settings).await
        }
        Command::Query {
            common,
            metric,
            labels,
        } => {
            let overrides = Overrides {
                endpoint: common.endpoint,
                ..Overrides::default()
            };
            let settings = Settings::resolve(&load_config(common.config.as_ref())?, &overrides)?;
            run_query(settings, &metric, labels.into_iter().collect()).await
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<ExtMetricsConfig> {
    match path {
        Some(path) => ExtMetricsConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(ExtMetricsConfig::default()),
    }
}

fn build_client(settings: &Settings) -> anyhow::Result<HttpMetricsClient> {
    Ok(
        HttpMetricsClient::new(&settings.endpoint, settings.provider_timeout)?
            .with_keys(settings.api_key.clone(), settings.app_key.clone()),
    )
}

async fn run_daemon(settings: Settings) -> anyhow::Result<()> {
    info!("extmetrics daemon starting");

    let Some(policies) = settings.policies.clone() else {
        bail!("no policy source: set [controller] policies or --policies");
    };

    std::fs::create_dir_all(&settings.data_dir)?;
    let db_path = settings.data_dir.join("extmetrics.redb");
    let state = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let client = Arc::new(build_client(&settings)?);
    info!(endpoint = %settings.endpoint, "provider client initialized");

    let processor = Processor::new(client, settings.max_age).with_bucket(settings.bucket);
    let source = FilePolicySource::new(policies);
    info!(policies = ?source.path(), "policy source initialized");

    let mut controller = Controller::new(processor, state, Box::new(source));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let interval = settings.interval;
    let controller_handle = tokio::spawn(async move {
        controller.run(interval, shutdown_rx).await;
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to install CTRL+C handler")?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = controller_handle.await;
    info!("extmetrics daemon stopped");
    Ok(())
}

async fn run_query(settings: Settings, metric: &str, labels: Labels) -> anyhow::Result<()> {
    let client = Arc::new(build_client(&settings)?);
    let validator = Validator::new(client).with_bucket(settings.bucket);
    let value = validator.validate(metric, &labels, epoch_secs()).await?;
    println!("{metric} = {value}");
    Ok(())
}

fn parse_label(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("expected key=value, got {s:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn default_log_filter_covers_every_crate() {
        for target in [
            "extmetricsd",
            "extmetrics_hpa",
            "extmetrics_state",
            "extmetrics_provider",
        ] {
            assert!(DEFAULT_LOG_FILTER.contains(&format!("{target}=debug")));
        }
        assert!(tracing_subscriber::EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }

    #[test]
    fn parse_label_values() {
        assert_eq!(
            parse_label("role=web"),
            Ok(("role".to_string(), "web".to_string()))
        );
        assert_eq!(
            parse_label("expr=a=b"),
            Ok(("expr".to_string(), "a=b".to_string()))
        );
        assert!(parse_label("role").is_err());
        assert!(parse_label("=web").is_err());
    }

    #[test]
    fn query_command_collects_labels() {
        let cli = Cli::try_parse_from([
            "extmetricsd",
            "query",
            "--endpoint",
            "http://127.0.0.1:8080",
            "--metric",
            "requests",
            "--label",
            "role=web",
            "--label",
            "env=prod",
        ])
        .unwrap();

        match cli.command {
            Command::Query { metric, labels, .. } => {
                assert_eq!(metric, "requests");
                assert_eq!(labels.len(), 2);
            }
            Command::Run { .. } => panic!("expected query command"),
        }
    }
}
