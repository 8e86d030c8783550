//! Ordered route table.
//!
//! # Responsibilities
//! - Store global middlewares and routes in registration order
//! - Run every layer whose method and path match, until one finishes
//! - Send failures to the error handler, unmatched requests to a 404
//!
//! # Design Decisions
//! - Immutable after construction (shared behind `Arc`, no locks)
//! - Route params are bound on the exchange before the route's chain runs
//! - A chain that returns `Next` falls through to the following layers

use std::sync::Arc;

use axum::http::StatusCode;

use crate::error::RouteError;
use crate::http::middleware::{ErrorHandler, Flow, Middleware, PlainErrorHandler};
use crate::http::Exchange;
use crate::routing::matcher::PathMatcher;
use crate::routing::route_item::RouteMethod;

struct Layer {
    /// `None` for global middlewares.
    path: Option<(RouteMethod, PathMatcher)>,
    chain: Vec<Arc<dyn Middleware>>,
}

pub struct RouteTable {
    layers: Vec<Layer>,
    error_handler: Arc<dyn ErrorHandler>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteTable {
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            error_handler: Arc::new(PlainErrorHandler),
        }
    }

    /// Middleware run for every request, in registration order with routes.
    pub fn use_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.layers.push(Layer {
            path: None,
            chain: vec![middleware],
        });
    }

    pub fn route(&mut self, method: RouteMethod, matcher: PathMatcher, chain: Vec<Arc<dyn Middleware>>) {
        self.layers.push(Layer {
            path: Some((method, matcher)),
            chain,
        });
    }

    pub fn set_error_handler(&mut self, handler: Arc<dyn ErrorHandler>) {
        self.error_handler = handler;
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Run the table against `ex`. The exchange holds the response when this
    /// returns.
    pub async fn handle(&self, ex: &Exchange) {
        for layer in &self.layers {
            if let Some((method, matcher)) = &layer.path {
                if !method.matches(ex.method()) {
                    continue;
                }
                let Some(params) = matcher.matches(ex.path()) else {
                    continue;
                };
                ex.set_params(params);
            }

            for middleware in &layer.chain {
                match middleware.handle(ex).await {
                    Flow::Next => continue,
                    Flow::Done => return,
                    Flow::Fail(err) => {
                        self.fail(err, ex);
                        return;
                    }
                }
            }
        }

        ex.set_status(StatusCode::NOT_FOUND);
        ex.send(
            "text/plain; charset=utf-8",
            format!("Cannot {} {}", ex.method(), ex.path()),
        );
    }

    fn fail(&self, err: RouteError, ex: &Exchange) {
        if err.status().is_server_error() {
            tracing::error!(path = %ex.path(), error = %err, "Request failed");
        } else {
            tracing::debug!(path = %ex.path(), error = %err, "Request not resolved");
        }
        self.error_handler.handle(&err, ex);
    }
}
