//! Orphan detection for external metric records.
//!
//! Both functions are pure: no provider calls, no store access, same
//! inputs always yield the same output.

use std::collections::HashSet;

use extmetrics_core::{ExternalMetricValue, MetricSpec, ScalingPolicy};

/// Records whose owner uid is not among the live policies.
pub fn compute_delete_external_metrics(
    policies: &[ScalingPolicy],
    records: &[ExternalMetricValue],
) -> Vec<ExternalMetricValue> {
    let uids: HashSet<&str> = policies.iter().map(|p| p.uid.as_str()).collect();
    records
        .iter()
        .filter(|r| !uids.contains(r.owner.uid.as_str()))
        .cloned()
        .collect()
}

/// Records owned by `policy` for metrics its spec no longer declares.
pub fn compute_undeclared_external_metrics(
    policy: &ScalingPolicy,
    records: &[ExternalMetricValue],
) -> Vec<ExternalMetricValue> {
    let declared: HashSet<&str> = policy
        .spec
        .metrics
        .iter()
        .filter_map(|m| match m {
            MetricSpec::External { external } => Some(external.metric_name.as_str()),
            _ => None,
        })
        .collect();
    records
        .iter()
        .filter(|r| r.owner.uid == policy.uid && !declared.contains(r.metric_name.as_str()))
        .cloned()
        .collect()
}
