//! The metrics provider seam.

use std::future::Future;
use std::pin::Pin;

use crate::error::ProviderError;
use crate::types::Series;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Queries an external metrics provider.
///
/// `from` and `to` are Unix timestamps in seconds. Implementations own
/// transport, authentication and timeouts; callers issue one query at a
/// time and never retry.
pub trait MetricsClient: Send + Sync {
    fn query_metrics<'a>(
        &'a self,
        from: i64,
        to: i64,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Series>, ProviderError>>;
}
