//! Route auth gate.
//! Lets logged-in clients through and turns everyone else away.

use futures_util::future::BoxFuture;
use tracing::debug;

use crate::app::App;
use crate::http::middleware::{Flow, Middleware};
use crate::http::response::ApiResponse;
use crate::http::Exchange;
use crate::routing::AuthSpec;

/// Gate installed in front of routes with auth enabled and no custom
/// middleware.
pub struct AuthGate {
    app: App,
    spec: AuthSpec,
}

impl AuthGate {
    pub fn new(app: App, spec: AuthSpec) -> Self {
        Self { app, spec }
    }
}

impl Middleware for AuthGate {
    fn handle<'a>(&'a self, ex: &'a Exchange) -> BoxFuture<'a, Flow> {
        Box::pin(async move {
            let provider = self.app.auth_provider(&self.spec.module);
            if provider.has_login(ex).await {
                return Flow::Next;
            }

            let global = &self.app.config().auth;
            let return_url = if self.spec.ajax {
                let url = self
                    .spec
                    .ajax_failure_url
                    .clone()
                    .or_else(|| global.ajax_failure_url.clone());
                match url {
                    Some(url) => url,
                    None => {
                        debug!(path = %ex.path(), "Rejected ajax request without login");
                        self.app.renderer().api_render(ex, &ApiResponse::not_logged_in());
                        return Flow::Done;
                    }
                }
            } else {
                self.spec
                    .web_failure_url
                    .clone()
                    .or_else(|| global.web_failure_url.clone())
                    .unwrap_or_else(|| provider.login_url(ex))
            };

            debug!(path = %ex.path(), to = %return_url, "Redirecting request without login");
            ex.redirect_script(&return_url);
            Flow::Done
        })
    }
}
