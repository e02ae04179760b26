//! Validator — point-in-time queries against the metrics provider.
//!
//! Every call hits the provider: no caching, no retries. The caller decides
//! what to do with a failure.

use std::sync::Arc;
use std::time::Duration;

use extmetrics_core::Labels;
use extmetrics_provider::{MetricsClient, Series};

use crate::error::ValidationError;

pub use extmetrics_core::config::DEFAULT_BUCKET;

/// Asks the provider for the current value of an external metric.
#[derive(Clone)]
pub struct Validator {
    client: Arc<dyn MetricsClient>,
    bucket: Duration,
}

impl Validator {
    pub fn new(client: Arc<dyn MetricsClient>) -> Self {
        Self {
            client,
            bucket: DEFAULT_BUCKET,
        }
    }

    /// Set the query window width.
    pub fn with_bucket(mut self, bucket: Duration) -> Self {
        self.bucket = bucket;
        self
    }

    /// Query `metric_name` scoped by `labels` over `[now - bucket, now]`.
    ///
    /// Returns the last point of the first matching series, truncated to
    /// an integer.
    pub async fn validate(
        &self,
        metric_name: &str,
        labels: &Labels,
        now: i64,
    ) -> Result<i64, ValidationError> {
        if metric_name.is_empty() {
            return Err(ValidationError::EmptyMetricName);
        }

        let query = build_query(metric_name, labels);
        let from = now.saturating_sub(self.bucket.as_secs() as i64);
        let series = self
            .client
            .query_metrics(from, now, &query)
            .await
            .map_err(|source| ValidationError::Provider {
                query: query.clone(),
                source,
            })?;

        interpret(&series, query)
    }
}

/// Build the provider query: `metric{k1:v1,k2:v2}`, or `metric{*}` when
/// unscoped.
pub fn build_query(metric_name: &str, labels: &Labels) -> String {
    if labels.is_empty() {
        return format!("{metric_name}{{*}}");
    }
    let tags: Vec<String> = labels.iter().map(|(k, v)| format!("{k}:{v}")).collect();
    format!("{metric_name}{{{}}}", tags.join(","))
}

fn interpret(series: &[Series], query: String) -> Result<i64, ValidationError> {
    let first = match series.first() {
        Some(s) => s,
        None => return Err(ValidationError::NoSeries(query)),
    };
    let point = match first.last_point() {
        Some(p) => p,
        None => return Err(ValidationError::NoPoints(query)),
    };
    match point.value {
        Some(value) => Ok(value as i64),
        None => Err(ValidationError::MissingValue(query)),
    }
}
