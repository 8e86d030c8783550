//! Per-request handle over the inbound request and the response being built.
//!
//! An `Exchange` is cheap to clone; every clone refers to the same request
//! and response. Route middlewares, the dispatcher, controllers and renderers
//! all write through it, and the server turns it into an axum `Response` once
//! the route chain settles.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::Response;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};

/// Parameters captured by the matched route, in capture order.
///
/// Wildcard captures use positional keys (`"0"`, `"1"`, ...), named segments
/// use their name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams(IndexMap<String, String>);

impl RouteParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// First positional capture (`params[0]`).
    pub fn first_positional(&self) -> Option<&str> {
        self.get("0")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.0.values().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build from a JSON object; non-string values use their JSON text.
    pub fn from_json(map: &Map<String, Value>) -> Self {
        let mut params = Self::new();
        for (key, value) in map {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            params.insert(key.clone(), value);
        }
        params
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RouteParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

#[derive(Debug)]
struct ResponseState {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Bytes>,
    locals: Map<String, Value>,
}

#[derive(Debug)]
struct Inner {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    params: RwLock<RouteParams>,
    response: Mutex<ResponseState>,
}

#[derive(Debug, Clone)]
pub struct Exchange {
    inner: Arc<Inner>,
}

impl Exchange {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            inner: Arc::new(Inner {
                method,
                uri,
                headers,
                body,
                params: RwLock::new(RouteParams::new()),
                response: Mutex::new(ResponseState {
                    status: StatusCode::OK,
                    headers: HeaderMap::new(),
                    body: None,
                    locals: Map::new(),
                }),
            }),
        }
    }

    /// Bare GET exchange, mostly for tests and contexts created outside a
    /// live request.
    pub fn get(uri: &str) -> Self {
        let uri = uri.parse().unwrap_or_else(|_| Uri::from_static("/"));
        Self::new(Method::GET, uri, HeaderMap::new(), Bytes::new())
    }

    pub fn with_header(self, name: &'static str, value: &str) -> Self {
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                if let Ok(value) = HeaderValue::from_str(value) {
                    inner.headers.insert(name, value);
                }
                Self { inner: Arc::new(inner) }
            }
            Err(inner) => Self { inner },
        }
    }

    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    pub fn uri(&self) -> &Uri {
        &self.inner.uri
    }

    pub fn path(&self) -> &str {
        self.inner.uri.path()
    }

    /// Path plus query string, as received.
    pub fn url(&self) -> &str {
        self.inner
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.inner.body
    }

    /// XHR requests and requests that only accept JSON.
    pub fn is_ajax(&self) -> bool {
        if self
            .header("x-requested-with")
            .is_some_and(|v| v.eq_ignore_ascii_case("xmlhttprequest"))
        {
            return true;
        }
        self.header(header::ACCEPT.as_str())
            .is_some_and(|accept| accept.contains("application/json") && !accept.contains("text/html"))
    }

    pub fn params(&self) -> RouteParams {
        self.inner.params.read().clone()
    }

    pub fn set_params(&self, params: RouteParams) {
        *self.inner.params.write() = params;
    }

    pub fn status(&self) -> StatusCode {
        self.inner.response.lock().status
    }

    pub fn set_status(&self, status: StatusCode) {
        self.inner.response.lock().status = status;
    }

    pub fn set_response_header(&self, name: header::HeaderName, value: HeaderValue) {
        self.inner.response.lock().headers.insert(name, value);
    }

    pub fn set_local(&self, key: impl Into<String>, value: Value) {
        self.inner.response.lock().locals.insert(key.into(), value);
    }

    pub fn local(&self, key: &str) -> Option<Value> {
        self.inner.response.lock().locals.get(key).cloned()
    }

    /// Whether a body has been written.
    pub fn is_finished(&self) -> bool {
        self.inner.response.lock().body.is_some()
    }

    /// Write the response body with the given content type.
    pub fn send(&self, content_type: &'static str, body: impl Into<Bytes>) {
        let mut state = self.inner.response.lock();
        state
            .headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        state.body = Some(body.into());
    }

    pub fn send_html(&self, html: impl Into<String>) {
        self.send("text/html; charset=utf-8", html.into());
    }

    pub fn send_json(&self, value: &Value) {
        self.send("application/json", value.to_string());
    }

    /// Client-side redirect through an inline script.
    pub fn redirect_script(&self, url: &str) {
        let escaped = url.replace('\\', "\\\\").replace('"', "\\\"");
        self.send_html(format!("<script>window.location = \"{}\";</script>", escaped));
    }

    /// Snapshot the response state into an axum response.
    pub fn to_response(&self) -> Response {
        let state = self.inner.response.lock();
        let body = state.body.clone().unwrap_or_default();
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = state.status;
        for (name, value) in state.headers.iter() {
            response.headers_mut().insert(name.clone(), value.clone());
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clones_share_state() {
        let ex = Exchange::get("/blog/post?page=2");
        let other = ex.clone();
        other.set_status(StatusCode::NOT_FOUND);
        other.send_html("missing");
        assert_eq!(ex.status(), StatusCode::NOT_FOUND);
        assert!(ex.is_finished());
        assert_eq!(ex.url(), "/blog/post?page=2");
        assert_eq!(ex.path(), "/blog/post");

        let response = ex.to_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
    }

    #[test]
    fn test_ajax_detection() {
        assert!(!Exchange::get("/").is_ajax());
        assert!(Exchange::get("/").with_header("x-requested-with", "XMLHttpRequest").is_ajax());
        assert!(Exchange::get("/").with_header("accept", "application/json").is_ajax());
        assert!(!Exchange::get("/")
            .with_header("accept", "text/html,application/json")
            .is_ajax());
    }

    #[test]
    fn test_params_from_json_keep_order() {
        let params = RouteParams::from_json(json!({"b": "2", "a": 1}).as_object().unwrap());
        assert_eq!(params.iter().collect::<Vec<_>>(), vec![("b", "2"), ("a", "1")]);
    }

    #[test]
    fn test_redirect_script_escapes_quotes() {
        let ex = Exchange::get("/");
        ex.redirect_script("/login?next=\"x\"");
        let body = ex.inner.response.lock().body.clone().unwrap();
        assert_eq!(
            body,
            Bytes::from("<script>window.location = \"/login?next=\\\"x\\\"\";</script>")
        );
    }
}
