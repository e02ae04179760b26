//! Provider client error types.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by a metrics provider query.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    #[error("invalid provider endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("provider rejected query: {0}")]
    Api(String),
}
