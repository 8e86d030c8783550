//! Request dispatch: resolution, bundle fallback, parameter binding and
//! action invocation.

use std::sync::Arc;

use axum::http::StatusCode;
use futures_util::future::BoxFuture;
use percent_encoding::percent_decode_str;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::app::App;
use crate::context::{RequestContext, BUNDLE_LOCAL, VIEW_PATH_LOCAL};
use crate::error::{ModuleError, RouteError};
use crate::http::{Exchange, RouteParams};
use crate::mvc::controller::{ActionArgs, ActionContext, ActionOutput};
use crate::mvc::resolver::{split_url, Resolution};
use crate::routing::RouteItem;

/// What to dispatch: a bare URL, or a route mapping with the URL it resolved
/// to.
#[derive(Debug, Clone)]
pub enum Target {
    Url(String),
    Route { item: Arc<RouteItem>, url: String },
}

impl Target {
    fn parts(&self) -> (&str, Option<&RouteItem>) {
        match self {
            Target::Url(url) => (url, None),
            Target::Route { item, url } => (url, Some(item)),
        }
    }
}

/// How a dispatched action left the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    Done,
    /// The action passed the request on to later routes.
    Next,
}

#[derive(Clone)]
pub struct Dispatcher {
    app: App,
}

impl Dispatcher {
    pub fn new(app: App) -> Self {
        Self { app }
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    /// Resolve `target` and run its action against `ex`.
    pub fn load_mvc(&self, target: Target, ex: Exchange) -> BoxFuture<'static, Result<Dispatched, RouteError>> {
        let this = self.clone();
        Box::pin(async move {
            let (url, item) = target.parts();
            let mut resolution = this.resolve(url, item, &ex)?;
            bind_params(&mut resolution, item, &ex.params());
            this.call_action(resolution, &ex).await
        })
    }

    /// Dispatch `url` on the current exchange, optionally replacing the
    /// bound route params first.
    pub fn forward(
        &self,
        ex: Exchange,
        url: String,
        params: Option<RouteParams>,
    ) -> BoxFuture<'static, Result<Dispatched, RouteError>> {
        if let Some(params) = params {
            ex.set_params(params);
        }
        debug!(url = %url, "Forwarding request");
        self.load_mvc(Target::Url(url), ex)
    }

    /// Turn a URL into a resolved controller, falling back to bundles.
    pub fn resolve(&self, url: &str, item: Option<&RouteItem>, ex: &Exchange) -> Result<Resolution, RouteError> {
        let url = clean_url(&substitute_params(url, &ex.params()));

        let mut resolution = Resolution::new(self.app.config(), self.app.controllers());
        if let Some(item) = item {
            resolution.init_params = item.params.clone();
        }
        resolution.reset(&url);
        let err = match resolution.load_controller() {
            Ok(()) => return Ok(resolution),
            Err(err) => err,
        };
        if err.is_compile() {
            ex.set_status(StatusCode::INTERNAL_SERVER_ERROR);
            return Err(err);
        }

        let bundles = self.app.bundles();
        let first_seg = url.split('/').next().unwrap_or_default();
        let split = split_url(bundles.candidates(first_seg), &url);
        if split.first_seg.is_empty() {
            ex.set_status(StatusCode::NOT_FOUND);
            return Err(err);
        }

        let config = self.app.config();
        let mut last_err = err;
        for prefix in &config.third_party_bundle.prefixes {
            resolution.reset(&url);
            if let Err(bundle_err) = resolution.load_bundle(&self.app, &split.first_seg, prefix) {
                if bundle_err.is_broken() {
                    ex.set_status(StatusCode::INTERNAL_SERVER_ERROR);
                    return Err(bundle_err.into());
                }
                ex.set_status(StatusCode::NOT_FOUND);
                warn!("Failed to load bundle \"{}\", ignored it.", self.bundle_path(prefix, &split.first_seg));
                last_err = bundle_err.into();
                continue;
            }

            resolution.url = split.rest.clone();
            return match resolution.load_controller() {
                Ok(()) => {
                    ex.set_status(StatusCode::OK);
                    Ok(resolution)
                }
                Err(err) => {
                    let status = if err.is_compile() {
                        StatusCode::INTERNAL_SERVER_ERROR
                    } else {
                        StatusCode::NOT_FOUND
                    };
                    ex.set_status(status);
                    Err(err)
                }
            };
        }

        ex.set_status(StatusCode::NOT_FOUND);
        Err(last_err)
    }

    fn bundle_path(&self, prefix: &str, name: &str) -> String {
        let config = self.app.config();
        let module = format!("{}{}", prefix, name);
        match &config.local_module_base_dir {
            Some(root) if config.third_party_bundle.is_local => root.join(module).display().to_string(),
            _ => module,
        }
    }

    async fn call_action(&self, mut resolution: Resolution, ex: &Exchange) -> Result<Dispatched, RouteError> {
        let controller_name = std::mem::take(&mut resolution.controller_name);
        let action = std::mem::take(&mut resolution.action_name);
        let Some(mut controller) = resolution.controller.take() else {
            return Err(ModuleError::NotFound(format!("{}Controller", controller_name)).into());
        };

        let ctx = Arc::new(RequestContext::from_resolution(&self.app, ex, &resolution));
        ex.set_local(VIEW_PATH_LOCAL, Value::String(resolution.view_path.clone()));
        ex.set_local(BUNDLE_LOCAL, Value::String(resolution.bundle_name.clone()));

        if action.starts_with('_') {
            return Err(RouteError::InvalidAction { action });
        }
        if !controller.has_action(&action) {
            ex.set_status(StatusCode::NOT_FOUND);
            return Err(RouteError::ActionNotFound {
                controller: controller_name,
                action,
            });
        }

        debug!(
            bundle = %resolution.bundle_name,
            controller = %controller_name,
            action = %action,
            args = resolution.params.len(),
            "Dispatching action"
        );

        let cx = ActionContext {
            exchange: ex.clone(),
            ctx: ctx.clone(),
            params: std::mem::take(&mut resolution.init_params),
            view_path: resolution.view_path.clone(),
            controller_name: controller_name.clone(),
            action_name: action.clone(),
        };
        controller.construct(&cx);

        let args = std::mem::take(&mut resolution.params);
        let output = controller.call(&action, cx, args).await.map_err(|err| {
            error!(controller = %controller_name, action = %action, error = %err, "Action failed");
            err
        })?;

        match output {
            ActionOutput::Empty => Ok(Dispatched::Done),
            ActionOutput::Next => Ok(Dispatched::Next),
            ActionOutput::Api(response) => {
                self.app.renderer().api_render(ex, &response);
                Ok(Dispatched::Done)
            }
            ActionOutput::View(model) => {
                let view_path = model.view_path.unwrap_or(resolution.view_path);
                ctx.bundle().html_render(Some(model.data), None, Some(&view_path))?;
                Ok(Dispatched::Done)
            }
        }
    }
}

/// Replace `${name}` placeholders with bound route params.
fn substitute_params(url: &str, params: &RouteParams) -> String {
    let mut url = url.to_string();
    for (key, value) in params.iter() {
        url = url.replace(&format!("${{{}}}", key), value);
    }
    url
}

/// Decode, drop the query string and trim slashes. Undecodable URLs are
/// used raw.
fn clean_url(url: &str) -> String {
    let decoded = match percent_decode_str(url).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => {
            warn!(url = %url, "Invalid URL encoding, dispatching it undecoded");
            url.to_string()
        }
    };
    let path = decoded.split('?').next().unwrap_or_default();
    path.trim_matches('/').to_string()
}

/// Choose action arguments. When the route's first positional capture is
/// the whole URL they come from the URL tail; otherwise from the declared
/// parameter sequence, or every bound param in order.
fn bind_params(resolution: &mut Resolution, item: Option<&RouteItem>, params: &RouteParams) {
    let first = params.first_positional().map(|p| p.trim_end_matches('/'));
    resolution.params = if first == Some(resolution.original_url.trim_end_matches('/')) {
        ActionArgs::new(resolution.positional_tail())
    } else if let Some(seq) = item.and_then(|i| i.param_seq.as_ref()) {
        ActionArgs::new(
            seq.iter()
                .map(|name| name.as_deref().and_then(|n| params.get(n)).map(str::to_string))
                .collect(),
        )
    } else {
        params.values().collect()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::mvc::registry::Registry;

    fn resolution_for(url: &str, tail: &[&str], pos: usize) -> Resolution {
        let mut r = Resolution::new(&AppConfig::default(), Arc::new(Registry::new()));
        r.reset(url);
        r.url_infos = tail.iter().map(|s| s.to_string()).collect();
        r.url_param_pos = pos;
        r
    }

    #[test]
    fn test_clean_url() {
        assert_eq!(clean_url("/blog/post/?page=2"), "blog/post");
        assert_eq!(clean_url("//caf%C3%A9//"), "café");
        assert_eq!(clean_url("/bad/%E0%A4%A"), "bad/%E0%A4%A");
    }

    #[test]
    fn test_substitute_params() {
        let params: RouteParams = [("id", "7"), ("slug", "abc")].into_iter().collect();
        assert_eq!(substitute_params("post/show/${id}/${slug}", &params), "post/show/7/abc");
    }

    #[test]
    fn test_bind_positional_tail() {
        let mut r = resolution_for("blog/post/show/42", &["blog", "post", "show", "42"], 3);
        let params: RouteParams = [("0", "blog/post/show/42/")].into_iter().collect();
        bind_params(&mut r, None, &params);
        assert_eq!(r.params, ActionArgs::from_iter(["42"]));
    }

    #[test]
    fn test_bind_param_seq() {
        let mut r = resolution_for("post/show", &["post", "show"], 2);
        let params: RouteParams = [("id", "7"), ("slug", "abc"), ("extra", "z")].into_iter().collect();
        let item = RouteItem::new("/p/:id/:slug").param_seq(["id", "slug"]);
        bind_params(&mut r, Some(&item), &params);
        assert_eq!(r.params, ActionArgs::from_iter(["7", "abc"]));
    }

    #[test]
    fn test_bind_all_params_in_order() {
        let mut r = resolution_for("post/show", &["post", "show"], 2);
        let params: RouteParams = [("slug", "abc"), ("id", "7")].into_iter().collect();
        bind_params(&mut r, Some(&RouteItem::new("/p/:slug/:id")), &params);
        assert_eq!(r.params, ActionArgs::from_iter(["abc", "7"]));
    }

    #[test]
    fn test_bind_missing_seq_name_is_none() {
        let mut r = resolution_for("post/show", &["post", "show"], 2);
        let params: RouteParams = [("id", "7")].into_iter().collect();
        let item = RouteItem::new("/p/:id").param_seq(["id", "page"]);
        bind_params(&mut r, Some(&item), &params);
        assert_eq!(r.params, ActionArgs::new(vec![Some("7".into()), None]));
    }
}
