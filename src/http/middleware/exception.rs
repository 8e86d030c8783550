//! Error-to-response translation, installed at the end of the route table.

use axum::http::StatusCode;
use serde_json::json;

use crate::error::RouteError;
use crate::http::Exchange;

pub trait ErrorHandler: Send + Sync {
    fn handle(&self, err: &RouteError, ex: &Exchange);
}

/// Status for a failed exchange: a status already set to an error wins,
/// otherwise the error's own.
fn error_status(err: &RouteError, ex: &Exchange) -> StatusCode {
    let current = ex.status();
    if current.is_client_error() || current.is_server_error() {
        current
    } else {
        err.status()
    }
}

/// Renders `{code, msg}` JSON bodies.
#[derive(Debug, Clone, Default)]
pub struct JsonExceptionHandler;

impl ErrorHandler for JsonExceptionHandler {
    fn handle(&self, err: &RouteError, ex: &Exchange) {
        let status = error_status(err, ex);
        ex.set_status(status);
        ex.send_json(&json!({
            "code": status.as_u16(),
            "msg": err.to_string(),
        }));
    }
}

/// Plain-text fallback used when the exception handler is disabled.
#[derive(Debug, Clone, Default)]
pub struct PlainErrorHandler;

impl ErrorHandler for PlainErrorHandler {
    fn handle(&self, err: &RouteError, ex: &Exchange) {
        let status = error_status(err, ex);
        ex.set_status(status);
        ex.send("text/plain; charset=utf-8", err.to_string());
    }
}
