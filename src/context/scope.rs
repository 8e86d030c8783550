//! Helpers scoped to the bundle a request resolved into.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::app::App;
use crate::bundle::BundleDescriptor;
use crate::context::service::{memoized_service, ServiceMemo, ServiceOptions};
use crate::dispatch::{Dispatched, Dispatcher};
use crate::error::RouteError;
use crate::http::{Exchange, RouteParams};
use crate::mvc::registry::ModelHandle;

/// Exchange local holding the resolved view path.
pub const VIEW_PATH_LOCAL: &str = "__viewPath__";

/// Exchange local holding the name of the bundle the request resolved into.
pub const BUNDLE_LOCAL: &str = "__bundleName__";

/// Bundle-scoped view of the request context. Outside any bundle the scope
/// points at the application tree and has no descriptor.
#[derive(Clone)]
pub struct BundleScope {
    app: App,
    exchange: Exchange,
    services: ServiceMemo,
    name: String,
    descriptor: Option<Arc<BundleDescriptor>>,
    views_base_dir: PathBuf,
}

impl BundleScope {
    pub(crate) fn new(
        app: App,
        exchange: Exchange,
        services: ServiceMemo,
        name: String,
        views_base_dir: PathBuf,
    ) -> Self {
        let descriptor = if name.is_empty() {
            None
        } else {
            app.bundles().loaded(&name)
        };
        Self {
            app,
            exchange,
            services,
            name,
            descriptor,
            views_base_dir,
        }
    }

    /// Bundle name, empty for the application tree.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_bundle(&self) -> bool {
        !self.name.is_empty()
    }

    pub fn descriptor(&self) -> Option<&BundleDescriptor> {
        self.descriptor.as_deref()
    }

    fn bundle_name(&self) -> Option<&str> {
        self.is_bundle().then_some(self.name.as_str())
    }

    fn entry_path(&self) -> &str {
        self.descriptor().map(|d| d.entry_path.as_str()).unwrap_or_default()
    }

    pub fn import_model(&self, name: &str) -> Result<ModelHandle, RouteError> {
        Ok(self.app.import_model(name, self.bundle_name())?)
    }

    pub fn load_view(&self, view_path: &str) -> Result<String, RouteError> {
        Ok(self.app.load_view(view_path, self.bundle_name())?)
    }

    /// Inside a bundle a missing layout falls back to the bundle's
    /// `htmlLayoutPath` or `layoutPath`.
    fn layout_for(&self, layout: Option<&str>) -> Option<PathBuf> {
        let layout = layout.or_else(|| self.descriptor().and_then(BundleDescriptor::default_layout))?;
        let path = Path::new(layout);
        if path.is_absolute() || !self.is_bundle() {
            Some(path.to_path_buf())
        } else {
            Some(self.views_base_dir.join(path))
        }
    }

    fn view_path_or_resolved(&self, view_path: Option<&str>) -> String {
        match view_path {
            Some(path) => path.to_string(),
            None => self
                .exchange
                .local(VIEW_PATH_LOCAL)
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
        }
    }

    pub fn html_render(
        &self,
        data: Option<Value>,
        layout: Option<&str>,
        view_path: Option<&str>,
    ) -> Result<(), RouteError> {
        let data = data.unwrap_or_else(|| Value::Object(Default::default()));
        let layout = self.layout_for(layout);
        let view_path = self.view_path_or_resolved(view_path);
        self.app
            .renderer()
            .html_render(&self.exchange, &data, layout.as_deref(), &view_path)?;
        Ok(())
    }

    /// JSON for ajax requests, HTML otherwise.
    pub fn auto_render(
        &self,
        data: Option<Value>,
        layout: Option<&str>,
        view_path: Option<&str>,
    ) -> Result<(), RouteError> {
        let data = data.unwrap_or_else(|| Value::Object(Default::default()));
        let layout = self.layout_for(layout);
        let view_path = self.view_path_or_resolved(view_path);
        self.app
            .renderer()
            .auto_render(&self.exchange, &data, layout.as_deref(), &view_path)?;
        Ok(())
    }

    /// Re-dispatch to `path` under the bundle's entry path.
    pub fn forward(&self, path: &str, params: Option<RouteParams>) -> BoxFuture<'static, Result<Dispatched, RouteError>> {
        let url = format!("{}{}", self.entry_path(), path);
        Dispatcher::new(self.app.clone()).forward(self.exchange.clone(), url, params)
    }

    pub fn get_service<T: Any + Send + Sync>(
        &self,
        name: &str,
        mut opts: ServiceOptions,
    ) -> Result<Arc<T>, RouteError> {
        if opts.bundle_name.is_none() {
            opts.bundle_name = self.bundle_name().map(str::to_string);
        }
        memoized_service(&self.app, &self.exchange, &self.services, name, opts)
    }

    pub fn get_view_path(&self, path: &str) -> PathBuf {
        self.views_base_dir.join(path)
    }

    /// Asset URL relative to the bundle's base URL. Absolute paths other than
    /// `/` are returned unchanged.
    pub fn get_asset_url(&self, url: &str) -> String {
        if url.starts_with('/') && url != "/" {
            return url.to_string();
        }

        let entry_path = format!(
            "{}{}",
            self.exchange.header("virtual-path").unwrap_or_default(),
            self.entry_path()
        );
        let mut base = self
            .descriptor()
            .and_then(|d| d.base_url.clone())
            .filter(|b| !b.is_empty())
            .unwrap_or(entry_path);
        if !base.ends_with('/') {
            base.push('/');
        }

        let joined = format!("{}{}", base, url);
        if joined.ends_with('/') {
            format!("{}/", joined.trim_end_matches('/'))
        } else {
            joined
        }
    }

    /// Like [`get_asset_url`](Self::get_asset_url), optionally prefixed with
    /// the scheme and host the client used.
    pub fn get_auto_asset_url(&self, url: &str, with_host_prefix: bool) -> String {
        let url = self.get_asset_url(url);
        if !with_host_prefix {
            return url;
        }

        let protocol = self
            .exchange
            .header("x-forwarded-proto")
            .map(str::to_string)
            .or_else(|| self.exchange.uri().scheme_str().map(str::to_string))
            .unwrap_or_else(|| "http".to_string())
            .to_lowercase();
        let host = self
            .exchange
            .header("host")
            .map(str::to_string)
            .or_else(|| self.exchange.uri().authority().map(|a| a.to_string()))
            .unwrap_or_else(|| "localhost".to_string());
        format!("{}://{}{}", protocol, host, url)
    }
}
