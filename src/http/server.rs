//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router funnelling every path into the route table
//! - Wire up middleware (timeout, request ID, tracing)
//! - Bind server to listener and shut down gracefully
//! - Record dispatch metrics

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::app::{App, StartupError};
use crate::config::AppConfig;
use crate::context::BUNDLE_LOCAL;
use crate::http::request::{read_exchange, request_id};
use crate::observability::metrics;
use crate::routing::RouteTable;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub app: App,
    pub routes: Arc<RouteTable>,
}

/// HTTP host for an [`App`].
pub struct HttpServer {
    router: Router,
    app: App,
}

impl HttpServer {
    /// Build the route table and the Axum router around it.
    pub fn new(app: App) -> Result<Self, StartupError> {
        let routes = Arc::new(app.dispatcher().add_routes()?);
        let state = AppState {
            app: app.clone(),
            routes,
        };
        let router = Self::build_router(app.config(), state);
        Ok(Self { router, app })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(mvc_handler))
            .route("/", any(mvc_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    /// The fully layered router, e.g. for driving it without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    /// Run the server on `listener` until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, app = %self.app.config().name, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main handler: runs the route table against the request.
async fn mvc_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(request.headers()).to_string();
    let method_str = request.method().to_string();

    let max_body_size = state.app.config().listener.max_body_size;
    let ex = match read_exchange(request, max_body_size).await {
        Ok(ex) => ex,
        Err(status) => {
            tracing::warn!(request_id = %request_id, status = %status, "Rejected request body");
            metrics::record_dispatch(&method_str, status.as_u16(), "", start_time);
            return (status, "Request body too large").into_response();
        }
    };

    tracing::debug!(
        request_id = %request_id,
        method = %method_str,
        url = %ex.url(),
        "Dispatching request"
    );

    state.routes.handle(&ex).await;

    let response = ex.to_response();
    let bundle = ex
        .local(BUNDLE_LOCAL)
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    metrics::record_dispatch(&method_str, response.status().as_u16(), &bundle, start_time);
    response
}
