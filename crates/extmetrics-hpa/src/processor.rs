//! Processor — turns autoscaling policies into external metric records and
//! keeps those records fresh.
//!
//! The processor holds only its configuration and a [`Validator`]; it can
//! be built once and reused across reconciliation ticks. Provider failures
//! never escape it: a record that cannot be validated is marked invalid,
//! stamped with the attempt time, and logged at debug level.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, error};

use extmetrics_core::{ExternalMetricValue, MetricSpec, ObjectReference, ScalingPolicy};
use extmetrics_provider::MetricsClient;

use crate::gc;
use crate::staleness::is_fresh;
use crate::validator::Validator;

pub struct Processor {
    /// Maximum age of a valid value before it must be revalidated.
    max_age: Duration,
    validator: Validator,
}

impl Processor {
    /// Create a processor querying `client`, reusing values for `max_age`.
    pub fn new(client: Arc<dyn MetricsClient>, max_age: Duration) -> Self {
        Self {
            max_age,
            validator: Validator::new(client),
        }
    }

    /// Set the width of the provider query window.
    pub fn with_bucket(mut self, bucket: Duration) -> Self {
        self.validator = self.validator.with_bucket(bucket);
        self
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Extract and validate the external metrics a policy declares.
    pub async fn process_policy(&self, policy: &ScalingPolicy) -> Vec<ExternalMetricValue> {
        self.process_policy_at(policy, epoch_secs()).await
    }

    /// Like [`process_policy`](Self::process_policy) with an explicit clock.
    ///
    /// Yields one record per `External` entry, in declaration order. Other
    /// source types are skipped. An empty metric list is logged as an error
    /// and yields nothing.
    pub async fn process_policy_at(
        &self,
        policy: &ScalingPolicy,
        now: i64,
    ) -> Vec<ExternalMetricValue> {
        if policy.spec.metrics.is_empty() {
            error!(
                namespace = %policy.namespace,
                policy = %policy.name,
                "error processing external metrics, empty metric list"
            );
            return Vec::new();
        }

        let mut records = Vec::new();
        for spec in &policy.spec.metrics {
            match spec {
                MetricSpec::External { external } => {
                    let mut record = ExternalMetricValue::new(
                        external.metric_name.clone(),
                        external.metric_selector.match_labels.clone(),
                        ObjectReference::from(policy),
                        now,
                    );
                    self.revalidate(&mut record, now).await;
                    records.push(record);
                }
                other => {
                    debug!(
                        kind = other.kind(),
                        namespace = %policy.namespace,
                        policy = %policy.name,
                        "unsupported metric type"
                    );
                }
            }
        }
        records
    }

    /// Revalidate every record that is not fresh.
    pub async fn update_external_metrics(
        &self,
        records: &mut [ExternalMetricValue],
    ) -> Vec<ExternalMetricValue> {
        self.update_external_metrics_at(records, epoch_secs()).await
    }

    /// Like [`update_external_metrics`](Self::update_external_metrics) with
    /// an explicit clock.
    ///
    /// Fresh records are left untouched. The rest are revalidated in place,
    /// one provider call at a time. Returns copies of the touched records
    /// in input order.
    pub async fn update_external_metrics_at(
        &self,
        records: &mut [ExternalMetricValue],
        now: i64,
    ) -> Vec<ExternalMetricValue> {
        let mut updated = Vec::new();
        for record in records.iter_mut() {
            if is_fresh(record, self.max_age, now) {
                continue;
            }
            self.revalidate(record, now).await;
            debug!(?record, "updated the external metric");
            updated.push(record.clone());
        }
        updated
    }

    /// Records owned by no live policy, to be deleted from the store.
    pub fn compute_delete_external_metrics(
        policies: &[ScalingPolicy],
        records: &[ExternalMetricValue],
    ) -> Vec<ExternalMetricValue> {
        gc::compute_delete_external_metrics(policies, records)
    }

    /// Query the provider for `record` and overwrite its value, validity
    /// and timestamp. The timestamp advances even when validation fails.
    async fn revalidate(&self, record: &mut ExternalMetricValue, now: i64) {
        record.valid = false;
        record.timestamp = record.timestamp.max(now);
        match self
            .validator
            .validate(&record.metric_name, &record.labels, now)
            .await
        {
            Ok(value) => {
                record.value = value;
                record.valid = true;
            }
            Err(e) => {
                record.value = 0;
                debug!(
                    metric = %record.metric_name,
                    error = %e,
                    "could not fetch the external metric, metric is no longer valid"
                );
            }
        }
    }
}

/// Current wall-clock time in whole seconds since the Unix epoch.
pub fn epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
