//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!     → tracing.rs (OpenTelemetry spans, traceparent propagation)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON)
//!     → Metrics endpoint (Prometheus scrape)
//!     → OTLP/HTTP collector (spans)
//! ```
//!
//! # Design Decisions
//! - Request ID and trace ID flow through all three services
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
pub mod tracing;

pub use self::logging::{Telemetry, TelemetryError};
