//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the chain.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration shared by the three services.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ChainConfig {
    /// Fan-out aggregator service.
    pub middleman: MiddlemanConfig,

    /// Downstream delay source.
    pub receiver: ReceiverConfig,

    /// Load driver.
    pub caller: CallerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Middleman (fan-out aggregator) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MiddlemanConfig {
    /// Bind address (e.g., "0.0.0.0:8190").
    pub bind_address: String,

    /// Full URL every worker calls.
    pub downstream_url: String,

    /// Number of concurrent downstream calls per inbound request.
    pub workers: usize,

    /// Upper bound (exclusive) of the locally simulated delay in milliseconds.
    pub max_latency_ms: u64,

    /// Total time allowed for one inbound request in milliseconds.
    pub request_timeout_ms: u64,

    /// Time allowed for one downstream call in milliseconds.
    pub worker_timeout_ms: u64,

    /// Fixed seed for the local delay. Each request builds a fresh RNG from it.
    pub local_delay_seed: Option<u64>,
}

impl Default for MiddlemanConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8190".to_string(),
            downstream_url: "http://localhost:8191/rng".to_string(),
            workers: 8,
            max_latency_ms: 1000,
            request_timeout_ms: 30_000,
            worker_timeout_ms: 10_000,
            local_delay_seed: None,
        }
    }
}

/// Receiver configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Bind address (e.g., "0.0.0.0:8191").
    pub bind_address: String,

    /// Upper bound (exclusive) of the reported delay in milliseconds.
    pub max_delay_ms: u64,

    /// One request in `failure_one_in` fails on purpose. 0 disables.
    pub failure_one_in: u32,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8191".to_string(),
            max_delay_ms: 1000,
            failure_one_in: 5,
        }
    }
}

/// Caller (load driver) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CallerConfig {
    /// URL hit on every tick.
    pub target_url: String,

    /// Seconds between ticks.
    pub interval_secs: u64,

    /// Concurrent requests per tick.
    pub workers: usize,

    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for CallerConfig {
    fn default() -> Self {
        Self {
            target_url: "http://localhost:8190/delay".to_string(),
            interval_secs: 1,
            workers: 8,
            request_timeout_ms: 30_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// OTLP/HTTP traces endpoint (e.g., "http://localhost:4318/v1/traces").
    /// Spans are still created and propagated when unset, just not exported.
    pub otlp_endpoint: Option<String>,

    /// Share of new root traces that are sampled, 0.0 to 1.0. Child spans
    /// follow their parent's decision.
    pub trace_sample_ratio: f64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
            otlp_endpoint: None,
            trace_sample_ratio: 1.0,
        }
    }
}
