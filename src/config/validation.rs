//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (worker counts, timeouts)
//! - Check that URLs and bind addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ChainConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ChainConfig;

/// A single violated rule.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid bind address {value:?}")]
    BindAddress { field: &'static str, value: String },

    #[error("{field}: {value:?} is not an http(s) URL")]
    Url { field: &'static str, value: String },

    #[error("{field}: must be at least 1")]
    Zero { field: &'static str },

    #[error("middleman.worker_timeout_ms ({worker}) exceeds middleman.request_timeout_ms ({request})")]
    WorkerTimeoutTooLoose { worker: u64, request: u64 },

    #[error("observability.log_level: unknown level {0:?}")]
    LogLevel(String),

    #[error("observability.trace_sample_ratio: {0} is outside 0.0..=1.0")]
    SampleRatio(f64),
}

/// Validate the whole configuration.
pub fn validate_config(config: &ChainConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let m = &config.middleman;
    check_bind(&mut errors, "middleman.bind_address", &m.bind_address);
    check_url(&mut errors, "middleman.downstream_url", &m.downstream_url);
    check_nonzero(&mut errors, "middleman.workers", m.workers as u64);
    check_nonzero(&mut errors, "middleman.request_timeout_ms", m.request_timeout_ms);
    check_nonzero(&mut errors, "middleman.worker_timeout_ms", m.worker_timeout_ms);
    if m.worker_timeout_ms > m.request_timeout_ms {
        errors.push(ValidationError::WorkerTimeoutTooLoose {
            worker: m.worker_timeout_ms,
            request: m.request_timeout_ms,
        });
    }

    check_bind(&mut errors, "receiver.bind_address", &config.receiver.bind_address);

    let c = &config.caller;
    check_url(&mut errors, "caller.target_url", &c.target_url);
    check_nonzero(&mut errors, "caller.interval_secs", c.interval_secs);
    check_nonzero(&mut errors, "caller.workers", c.workers as u64);
    check_nonzero(&mut errors, "caller.request_timeout_ms", c.request_timeout_ms);

    let o = &config.observability;
    if !matches!(
        o.log_level.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) {
        errors.push(ValidationError::LogLevel(o.log_level.clone()));
    }
    if o.metrics_enabled {
        check_bind(&mut errors, "observability.metrics_address", &o.metrics_address);
    }
    if let Some(endpoint) = &o.otlp_endpoint {
        check_url(&mut errors, "observability.otlp_endpoint", endpoint);
    }
    if !(0.0..=1.0).contains(&o.trace_sample_ratio) {
        errors.push(ValidationError::SampleRatio(o.trace_sample_ratio));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_bind(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    let ok = Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
        .unwrap_or(false);
    if !ok {
        errors.push(ValidationError::Url {
            field,
            value: value.to_string(),
        });
    }
}

fn check_nonzero(errors: &mut Vec<ValidationError>, field: &'static str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::Zero { field });
    }
}
