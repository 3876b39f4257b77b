//! Receiver service: the downstream end of the chain.
//!
//! `GET /rng` sleeps for a random delay and reports it. A configurable share
//! of requests fails on purpose so the middleman sees partial failures. The
//! request span (see `http::server`) already continues the caller's trace, so
//! every event here is logged under its `trace_id`.

use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::config::ReceiverConfig;
use crate::fanout::DelayReport;
use crate::http::request::RequestIdExt;
use crate::http::response::{json_ok, text_error};
use crate::observability::metrics;

#[derive(Debug, Clone, Copy)]
pub struct ReceiverState {
    pub max_delay_ms: u64,
    pub failure_one_in: u32,
}

impl From<&ReceiverConfig> for ReceiverState {
    fn from(config: &ReceiverConfig) -> Self {
        Self {
            max_delay_ms: config.max_delay_ms,
            failure_one_in: config.failure_one_in,
        }
    }
}

impl ReceiverState {
    fn should_fail(&self) -> bool {
        self.failure_one_in > 0 && fastrand::u32(..self.failure_one_in) == 0
    }

    fn sample_delay(&self) -> u64 {
        if self.max_delay_ms == 0 {
            0
        } else {
            fastrand::u64(..self.max_delay_ms)
        }
    }
}

/// `GET /rng`
pub async fn rng_handler(State(state): State<ReceiverState>, headers: HeaderMap) -> Response {
    let start = Instant::now();

    let response = if state.should_fail() {
        tracing::warn!(request_id = %headers.request_id(), "could not do work");
        text_error(StatusCode::INTERNAL_SERVER_ERROR, "failure to do work")
    } else {
        let delay_ms = state.sample_delay();
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        tracing::info!(request_id = %headers.request_id(), delay_ms, "Great success");
        json_ok(&DelayReport::new(delay_ms)).unwrap_or_else(IntoResponse::into_response)
    };

    metrics::record_request("receiver", "/rng", response.status().as_u16(), start);
    response
}
