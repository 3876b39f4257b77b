//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the logging subsystem once per process
//! - Start the metrics exporter when enabled
//! - Install the OpenTelemetry layer so spans carry W3C trace ids
//! - Flush and close everything at process exit
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - Log lines carry the enclosing spans' `trace_id` field for correlation
//! - Log level configurable via config and `RUST_LOG`
//! - The handle is created in `main` and shut down explicitly; library code
//!   never installs a subscriber on its own

use std::net::SocketAddr;

use opentelemetry::global;
use opentelemetry_sdk::trace::SdkTracerProvider;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;
use crate::observability::metrics;
use crate::observability::tracing as otel;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),

    #[error("invalid metrics address {0:?}")]
    MetricsAddress(String),

    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to build span exporter: {0}")]
    Exporter(String),

    #[error("failed to flush spans: {0}")]
    Shutdown(String),
}

/// Process-wide logging, tracing and metrics handle for one service.
#[derive(Debug)]
pub struct Telemetry {
    service: &'static str,
    provider: SdkTracerProvider,
}

impl Telemetry {
    /// Install the subscriber, tracer provider and propagator (and the
    /// metrics exporter) for `service`.
    pub fn init(service: &'static str, config: &ObservabilityConfig) -> Result<Self, TelemetryError> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", config.log_level)));

        otel::install_propagator();
        let provider = otel::build_provider(service, config)?;
        global::set_tracer_provider(provider.clone());

        let registry = tracing_subscriber::registry()
            .with(filter)
            .with(otel::layer(&provider, service));
        if config.json_logs {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
                .try_init()?;
        } else {
            registry.with(tracing_subscriber::fmt::layer()).try_init()?;
        }

        if config.metrics_enabled {
            let addr: SocketAddr = config
                .metrics_address
                .parse()
                .map_err(|_| TelemetryError::MetricsAddress(config.metrics_address.clone()))?;
            metrics::init_metrics(addr)?;
        }

        tracing::info!(
            service,
            version = env!("CARGO_PKG_VERSION"),
            json = config.json_logs,
            metrics = config.metrics_enabled,
            otlp_endpoint = config.otlp_endpoint.as_deref().unwrap_or("none"),
            "Telemetry initialized"
        );
        Ok(Self { service, provider })
    }

    /// Flush buffered spans to the exporter and stop it.
    pub fn shutdown(self) -> Result<(), TelemetryError> {
        tracing::info!(service = self.service, "Telemetry shutting down");
        self.provider
            .shutdown()
            .map_err(|e| TelemetryError::Shutdown(e.to_string()))
    }
}
