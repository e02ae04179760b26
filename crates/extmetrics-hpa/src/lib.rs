//! extmetrics-hpa — external metric values for autoscaling policies.
//!
//! Turns the external metrics declared by autoscaling policies into cached
//! `ExternalMetricValue` records, keeps them fresh against the metrics
//! provider, and finds records whose owning policy is gone.
//!
//! # Freshness
//!
//! ```text
//! fresh(record) = record.valid && now - record.timestamp <= max_age
//!
//! fresh      → reused as is (no provider call, timestamp unchanged)
//! not fresh  → revalidated; timestamp = now even if the provider fails
//! max_age 0  → never fresh
//! ```

pub mod controller;
pub mod error;
pub mod gc;
pub mod processor;
pub mod staleness;
pub mod validator;

#[cfg(test)]
mod testing;

pub use controller::{Controller, FilePolicySource, PolicySource, TickReport};
pub use error::ValidationError;
pub use gc::{compute_delete_external_metrics, compute_undeclared_external_metrics};
pub use processor::{Processor, epoch_secs};
pub use staleness::is_fresh;
pub use validator::{Validator, build_query};
