//! Scripted provider client shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use extmetrics_provider::{BoxFuture, MetricsClient, Point, ProviderError, Series};

/// Replays scripted query results in order and records every query.
pub(crate) struct ScriptedClient {
    responses: Mutex<VecDeque<Result<Vec<Series>, ProviderError>>>,
    queries: Mutex<Vec<(i64, i64, String)>>,
}

impl ScriptedClient {
    pub(crate) fn new(responses: Vec<Result<Vec<Series>, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// `(from, to, query)` of every call so far.
    pub(crate) fn queries(&self) -> Vec<(i64, i64, String)> {
        self.queries.lock().unwrap().clone()
    }
}

impl MetricsClient for ScriptedClient {
    fn query_metrics<'a>(
        &'a self,
        from: i64,
        to: i64,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Series>, ProviderError>> {
        self.queries
            .lock()
            .unwrap()
            .push((from, to, query.to_string()));
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Request("script exhausted".to_string())));
        Box::pin(async move { next })
    }
}

/// A series whose points carry the given values, one second apart.
pub(crate) fn series_with(values: &[Option<f64>]) -> Series {
    Series {
        metric: "test".to_string(),
        points: values
            .iter()
            .enumerate()
            .map(|(i, value)| Point {
                timestamp: i as i64,
                value: *value,
            })
            .collect(),
    }
}

/// A successful provider response reporting `value`.
pub(crate) fn ok_value(value: f64) -> Result<Vec<Series>, ProviderError> {
    Ok(vec![series_with(&[Some(value)])])
}

/// A failed provider response.
pub(crate) fn provider_down() -> Result<Vec<Series>, ProviderError> {
    Err(ProviderError::Connect("connection refused".to_string()))
}
