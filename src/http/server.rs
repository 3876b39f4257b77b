//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router for the middleman or the receiver
//! - Wire up middleware (request ID, request span, request timeout)
//! - Continue the inbound W3C trace on each request span
//! - Bind server to listener
//! - Stop accepting and drain on shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::Span;

use crate::config::{MiddlemanConfig, ReceiverConfig};
use crate::fanout::{DownstreamClient, FanOutAggregator, FanOutSettings, HttpDownstream, LogSink};
use crate::http::handlers::{delay_handler, health_handler, relay_handler, MiddlemanState};
use crate::http::request::{RequestIdExt, RequestIdLayer};
use crate::observability::tracing as otel;
use crate::receiver::{rng_handler, ReceiverState};

/// HTTP server for one service of the chain.
pub struct HttpServer {
    service: &'static str,
    router: Router,
}

impl HttpServer {
    /// Middleman with the production HTTP client and log sink.
    pub fn middleman(config: &MiddlemanConfig) -> Result<Self, reqwest::Error> {
        let client = HttpDownstream::new(Duration::from_millis(config.worker_timeout_ms))?;
        let aggregator = FanOutAggregator::new(client, Arc::new(LogSink), FanOutSettings::from(config));
        Ok(Self::with_aggregator(
            aggregator,
            Duration::from_millis(config.request_timeout_ms),
        ))
    }

    /// Middleman around an already built aggregator.
    pub fn with_aggregator<C: DownstreamClient>(
        aggregator: FanOutAggregator<C>,
        request_timeout: Duration,
    ) -> Self {
        let state = MiddlemanState {
            aggregator: Arc::new(aggregator),
            request_timeout,
        };
        let router = Router::new()
            .route("/delay", get(delay_handler::<C>))
            .route("/", get(relay_handler::<C>))
            .route("/health", get(health_handler))
            .with_state(state);

        // No TimeoutLayer: /delay enforces request_timeout itself so the
        // cancelled workers are still reported; / is bounded by worker_timeout.
        Self {
            service: "middleman",
            router: Self::layered(router, None),
        }
    }

    pub fn receiver(config: &ReceiverConfig) -> Self {
        let router = Router::new()
            .route("/rng", get(rng_handler))
            .route("/health", get(health_handler))
            .with_state(ReceiverState::from(config));

        // The receiver sleeps up to max_delay_ms; leave headroom.
        let timeout = Duration::from_millis(config.max_delay_ms.saturating_mul(2).max(1_000));
        Self {
            service: "receiver",
            router: Self::layered(router, Some(timeout)),
        }
    }

    #[allow(deprecated)]
    fn layered(router: Router, request_timeout: Option<Duration>) -> Router {
        let router = match request_timeout {
            Some(timeout) => router.layer(TimeoutLayer::new(timeout)),
            None => router,
        };
        router
            .layer(TraceLayer::new_for_http().make_span_with(request_span::<Body>))
            .layer(RequestIdLayer)
    }

    /// The fully layered router, for in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(service = self.service, address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal");
            })
            .await?;

        tracing::info!(service = self.service, "HTTP server stopped");
        Ok(())
    }
}

/// Server span for one inbound request, parented on the caller's trace.
fn request_span<B>(request: &Request<B>) -> Span {
    let span = tracing::info_span!(
        "request",
        otel.name = %format!("{} {}", request.method(), request.uri().path()),
        otel.kind = "server",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request.headers().request_id(),
        trace_id = tracing::field::Empty,
    );
    otel::accept_remote_parent(&span, request.headers());
    otel::record_trace_id(&span);
    span
}
