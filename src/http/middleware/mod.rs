//! Route middleware contract.
//!
//! Middlewares run in route order against a shared [`Exchange`]. Each one
//! either passes control on, finishes the exchange, or fails it into the
//! error pipeline (`next()`, a written response, `next(err)`).

pub mod access_control;
pub mod exception;

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::error::RouteError;
use crate::http::Exchange;

pub use access_control::AuthGate;
pub use exception::{ErrorHandler, JsonExceptionHandler, PlainErrorHandler};

/// Outcome of one middleware.
#[derive(Debug)]
pub enum Flow {
    /// Continue with the next middleware or route.
    Next,
    /// The response is complete.
    Done,
    /// Skip to the error handler.
    Fail(RouteError),
}

pub trait Middleware: Send + Sync {
    fn handle<'a>(&'a self, ex: &'a Exchange) -> BoxFuture<'a, Flow>;
}

struct FnMiddleware<F>(F);

impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Exchange) -> Fut + Send + Sync,
    Fut: Future<Output = Flow> + Send + 'static,
{
    fn handle<'a>(&'a self, ex: &'a Exchange) -> BoxFuture<'a, Flow> {
        Box::pin((self.0)(ex.clone()))
    }
}

/// Middleware from an async closure.
pub fn middleware_fn<F, Fut>(f: F) -> Arc<dyn Middleware>
where
    F: Fn(Exchange) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Flow> + Send + 'static,
{
    Arc::new(FnMiddleware(f))
}
