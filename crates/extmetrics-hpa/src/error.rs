//! Validation error types.

use thiserror::Error;

use extmetrics_provider::ProviderError;

/// Why an external metric could not be validated.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("no metric name")]
    EmptyMetricName,

    #[error("error while executing metric query {query}: {source}")]
    Provider {
        query: String,
        #[source]
        source: ProviderError,
    },

    #[error("no series returned for query {0}")]
    NoSeries(String),

    #[error("no points in series for query {0}")]
    NoPoints(String),

    #[error("last point has no value for query {0}")]
    MissingValue(String),
}
