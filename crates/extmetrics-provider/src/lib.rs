//! extmetrics-provider — access to the external metrics provider.
//!
//! The [`MetricsClient`] trait is the seam the processor depends on: a
//! single point-in-time query returning time series. [`HttpMetricsClient`]
//! implements it against a Datadog-style `/api/v1/query` endpoint. Tests
//! substitute scripted in-memory clients.
//!
//! Retries and rate limiting are not performed here; a failed query is
//! returned to the caller as a [`ProviderError`].

pub mod client;
pub mod error;
pub mod http_client;
pub mod types;

pub use client::{BoxFuture, MetricsClient};
pub use error::ProviderError;
pub use http_client::HttpMetricsClient;
pub use types::{Point, Series};
