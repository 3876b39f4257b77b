//! Distributed tracing.
//!
//! # Responsibilities
//! - Build the OpenTelemetry tracer provider, exporting over OTLP/HTTP when
//!   an endpoint is configured
//! - Continue the W3C trace carried by inbound headers on the request span
//! - Write the current span's trace context into outbound headers
//! - Expose trace ids so log lines can be joined with spans
//!
//! # Design Decisions
//! - Code only ever creates `tracing` spans; `tracing-opentelemetry` turns
//!   them into OpenTelemetry spans (`otel.kind`, `otel.name` fields)
//! - Propagation goes through the global `TraceContextPropagator`
//! - Without an endpoint spans still get ids and propagate, nothing is exported

use ::tracing::{Span, Subscriber};
use axum::http::HeaderMap;
use opentelemetry::trace::{TraceContextExt, TracerProvider as _};
use opentelemetry::{global, KeyValue};
use opentelemetry_http::{HeaderExtractor, HeaderInjector};
use opentelemetry_otlp::{Protocol, SpanExporter, WithExportConfig};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::config::ObservabilityConfig;
use crate::observability::logging::TelemetryError;

/// Use W3C `traceparent`/`tracestate` for every inject and extract.
pub fn install_propagator() {
    global::set_text_map_propagator(TraceContextPropagator::new());
}

/// Tracer provider for `service`. Spans are batch exported when
/// `config.otlp_endpoint` is set.
pub fn build_provider(
    service: &'static str,
    config: &ObservabilityConfig,
) -> Result<SdkTracerProvider, TelemetryError> {
    let resource = Resource::builder()
        .with_attributes([
            KeyValue::new("service.name", service),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ])
        .build();
    let sampler = Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
        config.trace_sample_ratio,
    )));

    let mut builder = SdkTracerProvider::builder()
        .with_sampler(sampler)
        .with_resource(resource);
    if let Some(endpoint) = &config.otlp_endpoint {
        let exporter = SpanExporter::builder()
            .with_http()
            .with_protocol(Protocol::HttpBinary)
            .with_endpoint(endpoint.as_str())
            .build()
            .map_err(|e| TelemetryError::Exporter(e.to_string()))?;
        builder = builder.with_batch_exporter(exporter);
    }
    Ok(builder.build())
}

/// Subscriber layer that records `tracing` spans through `provider`.
pub fn layer<S>(provider: &SdkTracerProvider, service: &'static str) -> impl Layer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    tracing_opentelemetry::layer().with_tracer(provider.tracer(service))
}

/// Make `span` a child of the trace carried by `headers`. A request without
/// valid trace headers starts a new root.
pub fn accept_remote_parent(span: &Span, headers: &HeaderMap) {
    let parent = global::get_text_map_propagator(|p| p.extract(&HeaderExtractor(headers)));
    span.set_parent(parent);
}

/// Write `span`'s trace context into outbound `headers`.
pub fn inject_context(span: &Span, headers: &mut HeaderMap) {
    let cx = span.context();
    global::get_text_map_propagator(|p| p.inject_context(&cx, &mut HeaderInjector(headers)));
}

/// Lower-case hex trace id of `span`; `None` without an OpenTelemetry layer.
pub fn trace_id(span: &Span) -> Option<String> {
    let cx = span.context();
    let otel_span = cx.span();
    let span_context = otel_span.span_context();
    span_context
        .is_valid()
        .then(|| span_context.trace_id().to_string())
}

/// Fill `span`'s `trace_id` field, which must be declared `Empty`.
pub fn record_trace_id(span: &Span) {
    if let Some(id) = trace_id(span) {
        span.record("trace_id", id.as_str());
    }
}
