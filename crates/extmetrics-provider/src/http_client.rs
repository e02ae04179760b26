//! HTTP client for a Datadog-style metrics query API.
//!
//! Issues `GET {endpoint}/api/v1/query?from=..&to=..&query=..` over a fresh
//! HTTP/1 connection per query and decodes the `series` / `pointlist`
//! response body. Every query is bounded by the configured timeout.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use serde::Deserialize;
use tracing::debug;

use crate::client::{BoxFuture, MetricsClient};
use crate::error::ProviderError;
use crate::types::{Point, Series};

/// Queries the provider's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpMetricsClient {
    /// `host:port` to connect to.
    address: String,
    /// Value of the `host` header (authority as configured).
    host: String,
    /// Path prefix from the endpoint URL, without trailing slash.
    base_path: String,
    api_key: Option<String>,
    app_key: Option<String>,
    timeout: Duration,
}

impl HttpMetricsClient {
    /// Create a client for an `http://host[:port][/prefix]` endpoint.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let uri: http::Uri = endpoint
            .parse()
            .map_err(|e| ProviderError::InvalidEndpoint(format!("{endpoint}: {e}")))?;

        if uri.scheme_str() != Some("http") {
            return Err(ProviderError::InvalidEndpoint(format!(
                "{endpoint}: only http:// endpoints are supported"
            )));
        }
        let authority = uri
            .authority()
            .ok_or_else(|| ProviderError::InvalidEndpoint(format!("{endpoint}: missing host")))?;

        Ok(Self {
            address: format!("{}:{}", authority.host(), authority.port_u16().unwrap_or(80)),
            host: authority.as_str().to_string(),
            base_path: uri.path().trim_end_matches('/').to_string(),
            api_key: None,
            app_key: None,
            timeout,
        })
    }

    /// Send `DD-API-KEY` / `DD-APPLICATION-KEY` headers with every query.
    pub fn with_keys(mut self, api_key: Option<String>, app_key: Option<String>) -> Self {
        self.api_key = api_key;
        self.app_key = app_key;
        self
    }

    fn request_path(&self, from: i64, to: i64, query: &str) -> String {
        format!(
            "{}/api/v1/query?from={from}&to={to}&query={}",
            self.base_path,
            encode_component(query)
        )
    }

    async fn execute(&self, path: &str) -> Result<Vec<Series>, ProviderError> {
        let stream = tokio::net::TcpStream::connect(&self.address)
            .await
            .map_err(|e| ProviderError::Connect(format!("{}: {e}", self.address)))?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| ProviderError::Connect(e.to_string()))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let mut builder = http::Request::builder()
            .method("GET")
            .uri(path)
            .header("host", &self.host)
            .header("accept", "application/json")
            .header("user-agent", "extmetrics/0.1");
        if let Some(key) = &self.api_key {
            builder = builder.header("DD-API-KEY", key);
        }
        if let Some(key) = &self.app_key {
            builder = builder.header("DD-APPLICATION-KEY", key);
        }
        let req = builder
            .body(Empty::<Bytes>::new())
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?
            .to_bytes();

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        decode_response(&body)
    }
}

impl MetricsClient for HttpMetricsClient {
    fn query_metrics<'a>(
        &'a self,
        from: i64,
        to: i64,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Series>, ProviderError>> {
        Box::pin(async move {
            let path = self.request_path(from, to, query);
            match tokio::time::timeout(self.timeout, self.execute(&path)).await {
                Ok(result) => result,
                Err(_) => {
                    debug!(%query, timeout = ?self.timeout, "metrics query timed out");
                    Err(ProviderError::Timeout(self.timeout))
                }
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    series: Vec<RawSeries>,
}

#[derive(Debug, Deserialize)]
struct RawSeries {
    #[serde(default)]
    metric: String,
    /// `[timestamp_ms, value]` pairs; the value may be null.
    #[serde(default)]
    pointlist: Vec<(f64, Option<f64>)>,
}

fn decode_response(body: &[u8]) -> Result<Vec<Series>, ProviderError> {
    let resp: QueryResponse =
        serde_json::from_slice(body).map_err(|e| ProviderError::Decode(e.to_string()))?;

    if resp.error.is_some() || resp.status.as_deref() == Some("error") {
        return Err(ProviderError::Api(
            resp.error.unwrap_or_else(|| "unknown error".to_string()),
        ));
    }

    Ok(resp
        .series
        .into_iter()
        .map(|raw| Series {
            metric: raw.metric,
            points: raw
                .pointlist
                .into_iter()
                .map(|(ts_ms, value)| Point {
                    timestamp: (ts_ms / 1000.0) as i64,
                    value,
                })
                .collect(),
        })
        .collect())
}

/// Percent-encode a query string component (RFC 3986 unreserved set kept).
fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
