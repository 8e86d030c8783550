use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::BoxFuture;

use crate::app::App;
use crate::context::scope::BundleScope;
use crate::context::service::{memoized_service, ServiceMemo, ServiceOptions};
use crate::dispatch::{Dispatched, Dispatcher};
use crate::error::RouteError;
use crate::http::{Exchange, RouteParams};
use crate::mvc::registry::ModelHandle;
use crate::mvc::resolver::Resolution;

/// Per-request context handed to actions.
#[derive(Clone)]
pub struct RequestContext {
    app: App,
    exchange: Exchange,
    bundle: BundleScope,
    services: ServiceMemo,
}

impl RequestContext {
    /// Context for a resolved request.
    pub fn from_resolution(app: &App, exchange: &Exchange, resolution: &Resolution) -> Self {
        Self::build(
            app,
            exchange,
            resolution.bundle_name.clone(),
            resolution.views_base_dir.clone(),
        )
    }

    /// Context bound to the application tree, outside MVC dispatch.
    pub fn detached(app: &App, exchange: &Exchange) -> Self {
        let views_dir = app.config().layout.views.base_dir.clone().unwrap_or_default();
        Self::build(app, exchange, String::new(), views_dir)
    }

    fn build(app: &App, exchange: &Exchange, bundle_name: String, views_base_dir: PathBuf) -> Self {
        let services: ServiceMemo = Arc::new(DashMap::new());
        let bundle = BundleScope::new(
            app.clone(),
            exchange.clone(),
            services.clone(),
            bundle_name,
            views_base_dir,
        );
        Self {
            app: app.clone(),
            exchange: exchange.clone(),
            bundle,
            services,
        }
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn exchange(&self) -> &Exchange {
        &self.exchange
    }

    pub fn bundle(&self) -> &BundleScope {
        &self.bundle
    }

    pub fn import_model(&self, name: &str, bundle_name: Option<&str>) -> Result<ModelHandle, RouteError> {
        Ok(self.app.import_model(name, bundle_name)?)
    }

    pub fn load_view(&self, view_path: &str, bundle_name: Option<&str>) -> Result<String, RouteError> {
        Ok(self.app.load_view(view_path, bundle_name)?)
    }

    /// Service `name`, created on first use and memoized for this request
    /// under its owning bundle (or module) and name.
    pub fn get_service<T: Any + Send + Sync>(&self, name: &str, opts: ServiceOptions) -> Result<Arc<T>, RouteError> {
        memoized_service(&self.app, &self.exchange, &self.services, name, opts)
    }

    /// Re-enter dispatch with a new URL on the current exchange.
    pub fn forward(&self, url: &str, params: Option<RouteParams>) -> BoxFuture<'static, Result<Dispatched, RouteError>> {
        Dispatcher::new(self.app.clone()).forward(self.exchange.clone(), url.to_string(), params)
    }

    pub fn app_value<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.app.app_context::<T>(name)
    }

    pub fn get_auto_asset_url(&self, url: &str, with_host_prefix: bool) -> String {
        self.bundle.get_auto_asset_url(url, with_host_prefix)
    }
}
