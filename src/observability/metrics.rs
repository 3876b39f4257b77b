//! Metrics collection and exposition.
//!
//! # Metrics
//! - `delay_chain_requests_total` (counter): requests by service, route, status
//! - `delay_chain_request_duration_seconds` (histogram): handler latency
//! - `delay_chain_worker_outcomes_total` (counter): fan-out worker results
//! - `delay_chain_aggregate_total` (counter): fan-out results
//! - `delay_chain_aggregate_delay_ms` (histogram): returned aggregate delay
//!
//! Recording is a no-op until a recorder is installed, so tests never need one.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one handled inbound request.
pub fn record_request(service: &'static str, route: &'static str, status: u16, start: Instant) {
    counter!(
        "delay_chain_requests_total",
        "service" => service,
        "route" => route,
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "delay_chain_request_duration_seconds",
        "service" => service,
        "route" => route
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record the terminal state of one fan-out worker.
pub fn record_worker_outcome(outcome: &'static str) {
    counter!("delay_chain_worker_outcomes_total", "outcome" => outcome).increment(1);
}

/// Record one fan-out result; `delay_ms` is `None` on failure.
pub fn record_aggregate(outcome: &'static str, delay_ms: Option<u64>) {
    counter!("delay_chain_aggregate_total", "outcome" => outcome).increment(1);
    if let Some(delay) = delay_ms {
        histogram!("delay_chain_aggregate_delay_ms").record(delay as f64);
    }
}
