//! Shared harness for the integration tests.

use std::path::Path;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use mvc_router::mvc::{ActionArgs, ActionContext, ActionOutput, FnController, Registry};
use mvc_router::{ApiResponse, App, AppConfig, HttpServer, RouteError};

/// Controller whose actions answer with what they were called with.
pub fn echo_controller(actions: &[&'static str]) -> FnController {
    let mut controller = FnController::new();
    for &name in actions {
        controller = controller.action(name, |cx: ActionContext, args: ActionArgs| async move {
            let body = json!({
                "bundle": cx.bundle().name(),
                "controller": cx.controller_name,
                "action": cx.action_name,
                "args": args.as_slice(),
            });
            Ok::<_, RouteError>(ActionOutput::Api(ApiResponse::ok(body)))
        });
    }
    controller
}

/// Build an app rooted at `base_dir` and the server around it.
pub fn server(base_dir: &Path, registry: Registry, configure: impl FnOnce(&mut AppConfig)) -> HttpServer {
    let mut config = AppConfig::with_base_dir(base_dir);
    configure(&mut config);
    let app = App::builder(config).registry(registry).build().unwrap();
    HttpServer::new(app).unwrap()
}

/// Send `method uri` through the router; returns status, body and request id.
#[allow(dead_code)]
pub async fn send(router: &Router, method: &str, uri: &str) -> (StatusCode, String, Option<String>) {
    send_request(router, Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()).await
}

pub async fn send_request(router: &Router, request: Request<Body>) -> (StatusCode, String, Option<String>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let request_id = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap(), request_id)
}

/// GET `uri` and parse the JSON body.
#[allow(dead_code)]
pub async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, body, _) = send(router, "GET", uri).await;
    let value = serde_json::from_str(&body).unwrap_or_else(|_| panic!("not JSON: {}", body));
    (status, value)
}
