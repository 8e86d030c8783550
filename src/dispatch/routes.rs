//! Route table assembly.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::app::App;
use crate::dispatch::dispatcher::{Dispatched, Dispatcher, Target};
use crate::http::middleware::{AuthGate, Flow, Middleware};
use crate::http::Exchange;
use crate::routing::{normalize_mappings, MappingError, PathMatcher, RouteItem, RouteTable};

/// Last handler of every route: dispatches the route target.
struct TerminalHandler {
    dispatcher: Dispatcher,
    item: Arc<RouteItem>,
}

impl Middleware for TerminalHandler {
    fn handle<'a>(&'a self, ex: &'a Exchange) -> BoxFuture<'a, Flow> {
        Box::pin(async move {
            let url = if self.item.is_auto {
                ex.url().to_string()
            } else {
                self.item.target.clone()
            };
            let target = Target::Route {
                item: self.item.clone(),
                url,
            };
            match self.dispatcher.load_mvc(target, ex.clone()).await {
                Ok(Dispatched::Done) => Flow::Done,
                Ok(Dispatched::Next) => Flow::Next,
                Err(err) => Flow::Fail(err),
            }
        })
    }
}

/// Handle for adding routes while the table is being built. Route
/// installers registered with the module registry receive one.
pub struct Routes<'a> {
    dispatcher: &'a Dispatcher,
    table: &'a mut RouteTable,
    errors: Vec<MappingError>,
}

impl<'a> Routes<'a> {
    pub fn app(&self) -> &App {
        self.dispatcher.app()
    }

    /// Append a route: `[auth gate?, extra middlewares.., dispatch]`. The
    /// gate is skipped while `auth.enabled` is off globally.
    pub fn add_route(&mut self, mut item: RouteItem) -> &mut Self {
        let matcher = match PathMatcher::new(&item.source) {
            Ok(matcher) => matcher,
            Err(source) => {
                self.errors.push(MappingError::Pattern {
                    route: item.source.to_string(),
                    source,
                });
                return self;
            }
        };
        if item.auth.module.is_empty() {
            item.auth.module = self.app().config().auth.module.clone();
        }

        let mut chain: Vec<Arc<dyn Middleware>> = Vec::new();
        if item.auth.enabled && self.app().config().auth.enabled {
            let gate = match &item.auth.middleware {
                Some(custom) => custom.clone(),
                None => Arc::new(AuthGate::new(self.app().clone(), item.auth.clone())),
            };
            chain.push(gate);
        }
        chain.extend(item.middlewares.iter().cloned());

        let method = item.method;
        chain.push(Arc::new(TerminalHandler {
            dispatcher: self.dispatcher.clone(),
            item: Arc::new(item),
        }));
        self.table.route(method, matcher, chain);
        self
    }

    pub fn use_middleware(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.table.use_middleware(middleware);
        self
    }
}

impl Dispatcher {
    /// Build the route table: configured mappings, registered route
    /// installers, the catch-all `/*` route, then the error handler.
    pub fn add_routes(&self) -> Result<RouteTable, MappingError> {
        let config = self.app().config();
        let mut table = RouteTable::new();

        let errors = {
            let mut routes = Routes {
                dispatcher: self,
                table: &mut table,
                errors: Vec::new(),
            };
            for item in normalize_mappings(&config.router, &config.auth)? {
                routes.add_route(item);
            }
            for install in self.app().registry().route_installers() {
                install(&mut routes);
            }
            routes.add_route(RouteItem::auto());
            routes.errors
        };
        if let Some(err) = errors.into_iter().next() {
            return Err(err);
        }

        if config.exception.enabled {
            table.set_error_handler(self.app().exception_handler());
        }
        tracing::info!(routes = table.len(), "Route table built");
        Ok(table)
    }
}
