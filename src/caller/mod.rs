//! Caller service: drives load through the chain.
//!
//! # Responsibilities
//! - Every interval, start one root transaction span (`caller.doWork(W)`)
//!   and fire `workers` concurrent requests at the middleman, each in its own
//!   `GET /` client span
//! - Log every response and every error
//! - Stop ticking on shutdown and wait for in-flight ticks
//!
//! # Design Decisions
//! - Ticks run as tasks so a slow middleman never delays the schedule
//! - Errors are logged where they happen; a tick summary is returned for tests

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use axum::http::HeaderMap;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{Instrument, Span};

use crate::config::CallerConfig;
use crate::observability::tracing as otel;

#[derive(Debug, Error)]
pub enum CallError {
    #[error("error performing http request: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected http status code {status}: {body}")]
    Status { status: u16, body: String },
}

/// Outcome counts for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct Caller {
    client: reqwest::Client,
    target_url: Arc<str>,
    workers: usize,
    interval: Duration,
}

impl Caller {
    pub fn new(config: &CallerConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .no_proxy()
            .build()?;
        Ok(Self {
            client,
            target_url: Arc::from(config.target_url.as_str()),
            workers: config.workers.max(1),
            interval: Duration::from_secs(config.interval_secs.max(1)),
        })
    }

    /// Fire one round of concurrent requests under a fresh root trace.
    pub async fn tick(&self, tick: u64) -> TickSummary {
        let span = tracing::info_span!(
            parent: None,
            "transaction",
            otel.name = %format!("caller.doWork({})", self.workers),
            tick,
            trace_id = tracing::field::Empty,
        );
        otel::record_trace_id(&span);
        tracing::info!(parent: &span, workers = self.workers, "started new transaction");

        let mut set = JoinSet::new();
        for worker in 0..self.workers {
            let caller = self.clone();
            let call_span = tracing::info_span!(
                parent: &span,
                "GET /",
                otel.kind = "client",
                http.url = %self.target_url,
                worker,
            );
            set.spawn(async move { caller.call().await }.instrument(call_span));
        }

        let mut summary = TickSummary::default();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(body)) => {
                    summary.succeeded += 1;
                    tracing::info!(parent: &span, body = %body, status_code = 200, "got response");
                }
                Ok(Err(e)) => {
                    summary.failed += 1;
                    tracing::error!(parent: &span, url = %self.target_url, error = %e, "doWork");
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(parent: &span, error = %e, "call task aborted");
                }
            }
        }
        summary
    }

    /// One GET carrying the current span's trace context.
    async fn call(&self) -> Result<String, CallError> {
        let mut headers = HeaderMap::new();
        otel::inject_context(&Span::current(), &mut headers);
        let response = self
            .client
            .get(&*self.target_url)
            .headers(headers)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(CallError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }

    /// Tick every interval until `shutdown` fires, then drain.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            target_url = %self.target_url,
            interval_secs = self.interval.as_secs(),
            "starting"
        );

        let mut ticker = tokio::time::interval(self.interval);
        let mut in_flight = JoinSet::new();
        let mut tick = 0u64;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tick += 1;
                    let caller = self.clone();
                    in_flight.spawn(async move { caller.tick(tick).await });
                }
                Some(done) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = done {
                        tracing::error!(error = %e, "tick task aborted");
                    }
                }
                _ = shutdown.recv() => break,
            }
        }

        tracing::info!(in_flight = in_flight.len(), "Caller stopping, waiting for in-flight ticks");
        while in_flight.join_next().await.is_some() {}
        tracing::info!("exit successful");
    }
}
