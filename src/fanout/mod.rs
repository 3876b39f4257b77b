//! Fan-out delay aggregation subsystem.
//!
//! # Data Flow
//! ```text
//! GET /delay
//!     → aggregator.rs (spawn W workers into a request-owned JoinSet)
//!         → client.rs (GET downstream in a client span, traceparent forwarded)
//!         → sink.rs (one event per worker)
//!     → wait for all W terminal states
//!     → types.rs (rounded mean of successes + local delay)
//!     → sink.rs (one aggregate event)
//!     → {"delay": <int>} or 500
//! ```
//!
//! # Design Decisions
//! - A failing worker never aborts its siblings
//! - Only total exhaustion reaches the inbound caller as an error
//! - No retries; the inbound caller retries the whole request if it wants

pub mod aggregator;
pub mod client;
pub mod error;
pub mod sink;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::{FanOutAggregator, FanOutSettings};
pub use client::{CallContext, DownstreamClient, HttpDownstream};
pub use error::{FanOutError, WorkerError};
pub use sink::{LogSink, OutcomeSink};
pub use types::{AggregationOutcome, DelayReport, FanOutResult, LocalDelay, Tally, WorkerRecord};
