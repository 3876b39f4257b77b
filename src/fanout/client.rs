//! Downstream HTTP client.
//!
//! # Responsibilities
//! - One GET per call, carrying `traceparent` and `x-request-id`
//! - Map transport and status failures onto `WorkerError`
//!
//! The trace context injected is that of the current span, so callers run
//! each call inside its own client span.
//!
//! # Design Decisions
//! - The aggregator is generic over `DownstreamClient` so tests can script
//!   responses, delays and hangs without a network
//! - Dropping the returned future aborts the request

use std::future::Future;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderValue};
use tracing::Span;

use crate::fanout::error::WorkerError;
use crate::http::request::X_REQUEST_ID;
use crate::observability::tracing::inject_context;

/// Per-request metadata forwarded downstream next to the trace context.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    pub request_id: Option<String>,
}

impl CallContext {
    pub fn new(request_id: Option<String>) -> Self {
        Self { request_id }
    }

    /// Outbound headers: the current span's trace context plus the request id.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        inject_context(&Span::current(), &mut headers);
        if let Some(id) = self.request_id.as_deref().and_then(|id| HeaderValue::from_str(id).ok()) {
            headers.insert(X_REQUEST_ID, id);
        }
        headers
    }
}

/// Capability to GET a downstream URL and return the 2xx body.
pub trait DownstreamClient: Send + Sync + 'static {
    fn get(
        &self,
        url: &str,
        ctx: &CallContext,
    ) -> impl Future<Output = Result<Bytes, WorkerError>> + Send;
}

/// `reqwest` backed client used in production.
#[derive(Debug, Clone)]
pub struct HttpDownstream {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpDownstream {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()?;
        Ok(Self { client, timeout })
    }

    fn map_error(&self, err: reqwest::Error) -> WorkerError {
        if err.is_timeout() {
            WorkerError::Timeout(self.timeout)
        } else {
            WorkerError::Transport(err.to_string())
        }
    }
}

impl DownstreamClient for HttpDownstream {
    async fn get(&self, url: &str, ctx: &CallContext) -> Result<Bytes, WorkerError> {
        let response = self
            .client
            .get(url)
            .headers(ctx.headers())
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %url, status_code = status.as_u16(), "HTTP call unsuccessful");
            return Err(WorkerError::Status(status.as_u16()));
        }

        response.bytes().await.map_err(|e| self.map_error(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::observability::tracing::{testing, trace_id};

    #[test]
    fn test_headers_carry_current_span_and_request_id() {
        let (_guard, _exporter) = testing::capture_spans();
        let span = tracing::info_span!("GET downstream", otel.kind = "client");
        let _entered = span.enter();

        let headers = CallContext::new(Some("req-1".into())).headers();
        assert_eq!(headers[X_REQUEST_ID], "req-1");
        let traceparent = headers["traceparent"].to_str().unwrap();
        assert!(traceparent.contains(&trace_id(&span).unwrap()));

        assert!(CallContext::default().headers().get(X_REQUEST_ID).is_none());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpDownstream::new(Duration::from_secs(2)).unwrap();
        let err = client
            .get(&format!("http://{addr}/rng"), &CallContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "transport");
    }
}
