//! Middleman request handlers.
//!
//! `/delay` owns its deadline: when `request_timeout` passes, the request's
//! cancellation token fires and the aggregation, running in its own task,
//! still reports every worker and the aggregate before the 500 goes out. A
//! client that disconnects fires the same token through a drop guard.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::fanout::{CallContext, DownstreamClient, FanOutAggregator, FanOutError, WorkerError};
use crate::http::request::RequestIdExt;
use crate::http::response::{json_ok, text_error};
use crate::observability::metrics;

/// Application state injected into middleman handlers.
pub struct MiddlemanState<C> {
    pub aggregator: Arc<FanOutAggregator<C>>,
    pub request_timeout: Duration,
}

impl<C> Clone for MiddlemanState<C> {
    fn clone(&self) -> Self {
        Self {
            aggregator: Arc::clone(&self.aggregator),
            request_timeout: self.request_timeout,
        }
    }
}

fn call_context(headers: &HeaderMap) -> CallContext {
    CallContext::new(Some(headers.request_id().to_string()))
}

/// `GET /delay`: fan out and answer with the aggregate delay.
pub async fn delay_handler<C: DownstreamClient>(
    State(state): State<MiddlemanState<C>>,
    headers: HeaderMap,
) -> Response {
    let start = Instant::now();
    let ctx = call_context(&headers);
    let span = tracing::info_span!("fanout", workers = state.aggregator.settings().workers);

    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let aggregator = Arc::clone(&state.aggregator);
    let token = cancel.clone();
    let mut task = tokio::spawn(
        async move { aggregator.run(&ctx, &token).await }.instrument(span),
    );

    let joined = tokio::select! {
        joined = &mut task => joined,
        _ = tokio::time::sleep(state.request_timeout) => {
            tracing::warn!(
                timeout_ms = state.request_timeout.as_millis() as u64,
                "Request deadline exceeded, cancelling workers"
            );
            cancel.cancel();
            task.await
        }
    };

    let outcome = joined.unwrap_or_else(|e| Err(FanOutError::Aborted(e.to_string())));
    let response = match outcome.and_then(|o| json_ok(&o.report())) {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };

    metrics::record_request("middleman", "/delay", response.status().as_u16(), start);
    response
}

/// `GET /`: forward one call downstream and copy its body back.
pub async fn relay_handler<C: DownstreamClient>(
    State(state): State<MiddlemanState<C>>,
    headers: HeaderMap,
) -> Response {
    let start = Instant::now();
    let ctx = call_context(&headers);
    let settings = state.aggregator.settings();
    let url = settings.downstream_url.as_str();
    let span = tracing::info_span!("GET downstream", otel.kind = "client", http.url = %url);

    let result = tokio::time::timeout(
        settings.worker_timeout,
        state.aggregator.client().get(url, &ctx).instrument(span),
    )
    .await
    .unwrap_or(Err(WorkerError::Timeout(settings.worker_timeout)));

    let response = match result {
        Ok(body) => {
            tracing::info!(request_id = %headers.request_id(), "Request processed successfully");
            (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], body).into_response()
        }
        Err(WorkerError::Status(code)) => {
            tracing::error!(url = %url, status_code = code, "Request failed to process successfully");
            text_error(
                StatusCode::IM_A_TEAPOT,
                format!("status code error: secondary call returned {code}"),
            )
        }
        Err(e) => {
            tracing::error!(url = %url, error = %e, "Error making HTTP request");
            text_error(StatusCode::INTERNAL_SERVER_ERROR, "Error making HTTP request")
        }
    };

    metrics::record_request("middleman", "/", response.status().as_u16(), start);
    response
}

/// `GET /health` on every service.
pub async fn health_handler() -> &'static str {
    "ok"
}
