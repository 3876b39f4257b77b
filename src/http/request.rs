//! Request ID handling.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) when the client sent none
//! - Echo it on the response
//! - Make it available to handlers for logging and forwarding
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - An incoming `x-request-id` is kept, so the ID survives the whole chain

use axum::http::{HeaderMap, HeaderName, HeaderValue, Request};
use tower::Layer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestId, PropagateRequestIdLayer, RequestId as TowerRequestId,
    SetRequestId, SetRequestIdLayer,
};

pub const X_REQUEST_ID: &str = "x-request-id";

/// UUID v4 request ID generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<TowerRequestId> {
        let id = uuid::Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(TowerRequestId::new)
    }
}

/// Sets `x-request-id` on the request and copies it onto the response.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = SetRequestId<PropagateRequestId<S>, MakeRequestUuid>;

    fn layer(&self, inner: S) -> Self::Service {
        let header = HeaderName::from_static(X_REQUEST_ID);
        let propagated = PropagateRequestIdLayer::new(header.clone()).layer(inner);
        SetRequestIdLayer::new(header, MakeRequestUuid).layer(propagated)
    }
}

/// Request ID accessor for header maps.
pub trait RequestIdExt {
    /// The request ID, or `"unknown"` when missing or not valid UTF-8.
    fn request_id(&self) -> &str;
}

impl RequestIdExt for HeaderMap {
    fn request_id(&self) -> &str {
        self.get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}
