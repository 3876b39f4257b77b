//! Response helpers.
//!
//! # Responsibilities
//! - JSON success bodies
//! - Map fan-out failures to plain-text 500 responses
//!
//! # Design Decisions
//! - Bodies are encoded before any status is committed, so an encoding
//!   failure can still become a clean 500

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::fanout::FanOutError;

/// Encode `value` as a 200 JSON response.
pub fn json_ok<T: Serialize>(value: &T) -> Result<Response, FanOutError> {
    let body = serde_json::to_vec(value)?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}

/// Plain-text error response.
pub fn text_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        message.into(),
    )
        .into_response()
}

impl IntoResponse for FanOutError {
    fn into_response(self) -> Response {
        match &self {
            FanOutError::Encode(e) => tracing::error!(error = %e, "Could not write response body"),
            FanOutError::Aborted(reason) => tracing::error!(reason = %reason, "Fan-out task aborted"),
            _ => {}
        }
        text_error(StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
    }
}
