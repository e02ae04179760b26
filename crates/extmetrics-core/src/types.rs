//! Domain types shared across extmetrics crates.
//!
//! `ScalingPolicy` mirrors the subset of a HorizontalPodAutoscaler object
//! that metric extraction needs. `ExternalMetricValue` is the cached record
//! persisted between reconciliation passes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Label selector used to scope an external metric query.
///
/// Ordered so that query strings and serialized records are deterministic.
pub type Labels = BTreeMap<String, String>;

// ── Autoscaling policy ─────────────────────────────────────────────

/// An autoscaling policy object as observed in the cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingPolicy {
    pub name: String,
    pub namespace: String,
    /// Unique for the lifetime of the object; records are owned by it.
    pub uid: String,
    pub spec: PolicySpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PolicySpec {
    #[serde(default)]
    pub metrics: Vec<MetricSpec>,
}

/// One declared scaling metric, discriminated by its source type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum MetricSpec {
    /// A metric sourced from outside the cluster. The only supported kind.
    External { external: ExternalMetricSource },
    Object {},
    Pods {},
    Resource {},
    /// Any source type this version does not know about.
    #[serde(other)]
    Unsupported,
}

impl MetricSpec {
    /// Source type name, as it appears in the `type` discriminator.
    pub fn kind(&self) -> &'static str {
        match self {
            MetricSpec::External { .. } => "External",
            MetricSpec::Object {} => "Object",
            MetricSpec::Pods {} => "Pods",
            MetricSpec::Resource {} => "Resource",
            MetricSpec::Unsupported => "Unsupported",
        }
    }

    /// Shorthand for building an external metric spec.
    pub fn external(metric_name: impl Into<String>, labels: Labels) -> Self {
        MetricSpec::External {
            external: ExternalMetricSource {
                metric_name: metric_name.into(),
                metric_selector: LabelSelector {
                    match_labels: labels,
                },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalMetricSource {
    pub metric_name: String,
    #[serde(default)]
    pub metric_selector: LabelSelector,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default)]
    pub match_labels: Labels,
}

// ── External metric records ────────────────────────────────────────

/// Identifies the policy object a record belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ObjectReference {
    pub name: String,
    pub namespace: String,
    pub uid: String,
}

impl From<&ScalingPolicy> for ObjectReference {
    fn from(policy: &ScalingPolicy) -> Self {
        Self {
            name: policy.name.clone(),
            namespace: policy.namespace.clone(),
            uid: policy.uid.clone(),
        }
    }
}

/// A cached external metric value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalMetricValue {
    pub metric_name: String,
    pub labels: Labels,
    /// Undefined unless `valid` is true. Read through [`usable_value`].
    ///
    /// [`usable_value`]: ExternalMetricValue::usable_value
    pub value: i64,
    /// Whether the last validation attempt succeeded.
    pub valid: bool,
    /// Unix timestamp (seconds) of the last validation attempt.
    pub timestamp: i64,
    pub owner: ObjectReference,
}

impl ExternalMetricValue {
    /// A not-yet-validated record for `metric_name` owned by `owner`.
    pub fn new(
        metric_name: impl Into<String>,
        labels: Labels,
        owner: ObjectReference,
        timestamp: i64,
    ) -> Self {
        Self {
            metric_name: metric_name.into(),
            labels,
            value: 0,
            valid: false,
            timestamp,
            owner,
        }
    }

    /// The value, if the last validation succeeded. Invalid records mean
    /// "no data", never zero.
    pub fn usable_value(&self) -> Option<i64> {
        self.valid.then_some(self.value)
    }

    /// Store key: `{namespace}/{name}/{uid}/{metric_name}`.
    pub fn table_key(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.owner.namespace, self.owner.name, self.owner.uid, self.metric_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> ObjectReference {
        ObjectReference {
            name: "api".to_string(),
            namespace: "default".to_string(),
            uid: "uid-1".to_string(),
        }
    }

    #[test]
    fn invalid_record_has_no_usable_value() {
        let mut record = ExternalMetricValue::new("requests", Labels::new(), owner(), 1000);
        record.value = 42;
        assert_eq!(record.usable_value(), None);

        record.valid = true;
        assert_eq!(record.usable_value(), Some(42));
    }

    #[test]
    fn table_key_includes_owner_and_metric() {
        let record = ExternalMetricValue::new("requests", Labels::new(), owner(), 1000);
        assert_eq!(record.table_key(), "default/api/uid-1/requests");
    }

    #[test]
    fn parse_policy_with_mixed_metric_types() {
        let json = r#"{
            "name": "api",
            "namespace": "default",
            "uid": "uid-1",
            "spec": {
                "metrics": [
                    {
                        "type": "External",
                        "external": {
                            "metricName": "nginx.net.request_per_s",
                            "metricSelector": { "matchLabels": { "role": "frontend" } }
                        }
                    },
                    { "type": "Resource", "resource": { "name": "cpu" } },
                    { "type": "ContainerResource" }
                ]
            }
        }"#;

        let policy: ScalingPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.spec.metrics.len(), 3);

        let mut labels = Labels::new();
        labels.insert("role".to_string(), "frontend".to_string());
        assert_eq!(
            policy.spec.metrics[0],
            MetricSpec::external("nginx.net.request_per_s", labels)
        );
        assert_eq!(policy.spec.metrics[1].kind(), "Resource");
        assert_eq!(policy.spec.metrics[2], MetricSpec::Unsupported);
    }

    #[test]
    fn external_selector_defaults_to_empty() {
        let json = r#"{ "type": "External", "external": { "metricName": "queue.depth" } }"#;
        let spec: MetricSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec, MetricSpec::external("queue.depth", Labels::new()));
    }
}
