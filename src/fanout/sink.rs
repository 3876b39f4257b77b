//! Observability sink for fan-out events.
//!
//! The aggregator reports exactly one event per worker outcome and one per
//! aggregate outcome. It does not care where they go.

use std::time::Duration;

use crate::fanout::error::{FanOutError, WorkerError};
use crate::fanout::types::{AggregationOutcome, DelayReport, Tally};
use crate::observability::metrics;

pub trait OutcomeSink: Send + Sync + 'static {
    fn worker_finished(
        &self,
        worker: usize,
        result: &Result<DelayReport, WorkerError>,
        elapsed: Duration,
    );

    fn aggregate_finished(&self, outcome: &Result<AggregationOutcome, FanOutError>, tally: Tally);
}

/// Writes events to `tracing` and the metrics recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl OutcomeSink for LogSink {
    fn worker_finished(
        &self,
        worker: usize,
        result: &Result<DelayReport, WorkerError>,
        elapsed: Duration,
    ) {
        let elapsed_ms = elapsed.as_millis() as u64;
        match result {
            Ok(report) => {
                tracing::info!(worker, delay_ms = report.delay_ms, elapsed_ms, "Worker succeeded");
                metrics::record_worker_outcome("success");
            }
            Err(WorkerError::Cancelled) => {
                tracing::debug!(worker, elapsed_ms, "Worker cancelled");
                metrics::record_worker_outcome("cancelled");
            }
            Err(e) => {
                tracing::warn!(worker, elapsed_ms, kind = e.kind(), error = %e, "Worker failed");
                metrics::record_worker_outcome(e.kind());
            }
        }
    }

    fn aggregate_finished(&self, outcome: &Result<AggregationOutcome, FanOutError>, tally: Tally) {
        match outcome {
            Ok(outcome) => {
                tracing::info!(
                    delay_ms = outcome.delay_ms,
                    succeeded = tally.succeeded,
                    failed = tally.failed,
                    cancelled = tally.cancelled,
                    "Request processed successfully"
                );
                metrics::record_aggregate("success", Some(outcome.delay_ms));
            }
            Err(FanOutError::Cancelled) => {
                tracing::debug!(
                    succeeded = tally.succeeded,
                    cancelled = tally.cancelled,
                    "Fan-out abandoned, inbound request cancelled"
                );
                metrics::record_aggregate("cancelled", None);
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    failed = tally.failed,
                    cancelled = tally.cancelled,
                    "Request failed to process successfully"
                );
                metrics::record_aggregate(e.kind(), None);
            }
        }
    }
}
