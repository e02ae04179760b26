//! Controller — the reconciliation loop around the [`Processor`].
//!
//! Each tick reads the live policies from a [`PolicySource`] and brings the
//! record store in line with them:
//!
//! ```text
//! 1. gc       delete records whose owner uid is gone
//! 2. extract  new or changed policies → fresh records (upsert), plus
//!             deletion of metrics the policy no longer declares
//! 3. refresh  revalidate stale records of unchanged policies (upsert touched)
//! ```
//!
//! Ticks are serialized: the loop awaits one tick before sleeping for the
//! next, so the store has a single writer during a pass.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use tracing::{debug, error, info};

use extmetrics_core::{ExternalMetricValue, MetricSpec, PolicySpec, ScalingPolicy};
use extmetrics_state::StateStore;

use crate::gc::{compute_delete_external_metrics, compute_undeclared_external_metrics};
use crate::processor::{Processor, epoch_secs};

/// Supplies the current set of autoscaling policies.
pub trait PolicySource: Send + Sync {
    fn list_policies(&self) -> anyhow::Result<Vec<ScalingPolicy>>;
}

/// Reads policies from a JSON file on every call.
///
/// Accepts either a bare array of policies or a list object with an
/// `items` array.
pub struct FilePolicySource {
    path: PathBuf,
}

impl FilePolicySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PolicyList {
    Items { items: Vec<ScalingPolicy> },
    Bare(Vec<ScalingPolicy>),
}

impl PolicySource for FilePolicySource {
    fn list_policies(&self) -> anyhow::Result<Vec<ScalingPolicy>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading policies from {}", self.path.display()))?;
        let list: PolicyList = serde_json::from_str(&content)
            .with_context(|| format!("parsing policies from {}", self.path.display()))?;
        Ok(match list {
            PolicyList::Items { items } => items,
            PolicyList::Bare(items) => items,
        })
    }
}

/// What one reconciliation tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Records removed from the store.
    pub deleted: usize,
    /// Records produced by extraction of new or changed policies.
    pub extracted: usize,
    /// Existing records revalidated because they were stale.
    pub refreshed: usize,
}

pub struct Controller {
    processor: Processor,
    state: StateStore,
    source: Box<dyn PolicySource>,
    /// Last extracted spec per policy uid.
    seen: HashMap<String, PolicySpec>,
}

impl Controller {
    pub fn new(processor: Processor, state: StateStore, source: Box<dyn PolicySource>) -> Self {
        Self {
            processor,
            state,
            source,
            seen: HashMap::new(),
        }
    }

    /// Run one reconciliation pass at the current time.
    pub async fn tick(&mut self) -> anyhow::Result<TickReport> {
        self.tick_at(epoch_secs()).await
    }

    /// Run one reconciliation pass with an explicit clock.
    pub async fn tick_at(&mut self, now: i64) -> anyhow::Result<TickReport> {
        let policies = self.source.list_policies()?;
        let stored = self.state.list_external_metrics()?;
        let mut report = TickReport::default();

        // Orphans go first: nothing below may revalidate a dead policy's metric.
        let orphans = compute_delete_external_metrics(&policies, &stored);
        report.deleted += self.state.delete_external_metrics(&orphans)? as usize;
        for orphan in &orphans {
            debug!(
                metric = %orphan.metric_name,
                namespace = %orphan.owner.namespace,
                policy = %orphan.owner.name,
                "deleting orphaned external metric"
            );
        }

        let live: HashSet<&str> = policies.iter().map(|p| p.uid.as_str()).collect();
        self.seen.retain(|uid, _| live.contains(uid.as_str()));

        let mut extracted = HashSet::new();
        for policy in &policies {
            if self.seen.get(&policy.uid) == Some(&policy.spec) {
                continue;
            }

            let undeclared = compute_undeclared_external_metrics(policy, &stored);
            report.deleted += self.state.delete_external_metrics(&undeclared)? as usize;

            // Stored records already matching a declared metric are adopted
            // as is and left to the refresh pass.
            let owned: Vec<&ExternalMetricValue> =
                stored.iter().filter(|r| r.owner.uid == policy.uid).collect();
            let mut pending = policy.clone();
            pending.spec.metrics.retain(|spec| match spec {
                MetricSpec::External { external } => !owned.iter().any(|r| {
                    r.metric_name == external.metric_name
                        && r.labels == external.metric_selector.match_labels
                }),
                _ => true,
            });
            let adopted = policy.spec.metrics.len() - pending.spec.metrics.len();
            let needs_extraction = adopted == 0
                || pending
                    .spec
                    .metrics
                    .iter()
                    .any(|spec| matches!(spec, MetricSpec::External { .. }));

            if needs_extraction {
                let mut records = self.processor.process_policy_at(&pending, now).await;
                for record in &mut records {
                    if let Some(previous) = owned
                        .iter()
                        .find(|r| r.metric_name == record.metric_name)
                    {
                        record.timestamp = record.timestamp.max(previous.timestamp);
                    }
                }
                self.state.put_external_metrics(&records)?;
                report.extracted += records.len();
                extracted.extend(records.iter().map(ExternalMetricValue::table_key));

                debug!(
                    namespace = %policy.namespace,
                    policy = %policy.name,
                    records = records.len(),
                    adopted,
                    "processed autoscaling policy"
                );
            } else {
                debug!(
                    namespace = %policy.namespace,
                    policy = %policy.name,
                    adopted,
                    "adopted stored external metrics"
                );
            }
            self.seen.insert(policy.uid.clone(), policy.spec.clone());
        }

        let mut existing: Vec<_> = self
            .state
            .list_external_metrics()?
            .into_iter()
            .filter(|r| !extracted.contains(&r.table_key()))
            .collect();
        let touched = self
            .processor
            .update_external_metrics_at(&mut existing, now)
            .await;
        self.state.put_external_metrics(&touched)?;
        report.refreshed = touched.len();

        Ok(report)
    }

    /// Run the reconciliation loop until shutdown.
    pub async fn run(
        &mut self,
        interval: Duration,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        info!(
            interval_secs = interval.as_secs(),
            max_age_secs = self.processor.max_age().as_secs(),
            "external metrics controller started"
        );

        loop {
            match self.tick().await {
                Ok(report) => {
                    info!(
                        deleted = report.deleted,
                        extracted = report.extracted,
                        refreshed = report.refreshed,
                        "external metrics reconciled"
                    );
                }
                Err(e) => {
                    error!(error = %e, "external metrics reconciliation failed");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => {
                    info!("external metrics controller shutting down");
                    break;
                }
            }
        }
    }
}
