//! Inbound request handling.
//!
//! # Responsibilities
//! - Read the request ID stamped by the request-id layer
//! - Enforce the body size limit while buffering the body
//! - Turn the axum request into an [`Exchange`]

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};

use crate::http::Exchange;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Request ID of an inbound request, `"unknown"` when absent.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Buffer the body (at most `max_body_size` bytes) and build the exchange.
pub async fn read_exchange(request: Request<Body>, max_body_size: usize) -> Result<Exchange, StatusCode> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, max_body_size)
        .await
        .map_err(|_| StatusCode::PAYLOAD_TOO_LARGE)?;
    Ok(Exchange::new(parts.method, parts.uri, parts.headers, body))
}
