//! Application root: configuration, registries and collaborators shared by
//! every request.
//!
//! # Data Flow
//! ```text
//! AppConfig
//!     → App::builder (normalize, validate, discover registry)
//!     → preload bundles flagged `preLoad`
//!     → App (cheap clone, passed explicitly to routes and contexts)
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::auth::{AnonymousAuth, AuthProvider};
use crate::bundle::{BundleError, BundleLoader, BundleRegistry};
use crate::config::merge::merge_core_fragment;
use crate::config::normalize::normalize;
use crate::config::validation::validate_config;
use crate::config::{AppConfig, ConfigError, ConfigSource, TomlDirSource};
use crate::context::service::{downcast, ServiceRequest};
use crate::context::{RequestContext, ServiceOptions};
use crate::dispatch::Dispatcher;
use crate::error::{ModuleError, RouteError};
use crate::http::middleware::{ErrorHandler, JsonExceptionHandler};
use crate::http::Exchange;
use crate::mvc::registry::{ControllerSource, ModelHandle, ModuleRoot, Registry};
use crate::routing::MappingError;
use crate::view::{PlainViewEngine, Renderer, ViewEngine, ViewError};

/// App context key reading the live host configuration tree, including
/// every bundle `core` fragment merged so far.
pub const CONFIG_CONTEXT_KEY: &str = "config";

/// App context key holding the normalized [`AppConfig`].
pub const PLUGIN_CONFIG_CONTEXT_KEY: &str = "pluginConfig";

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid route table: {0}")]
    Routes(#[from] MappingError),

    #[error("failed to preload bundle '{name}': {source}")]
    Bundle {
        name: String,
        #[source]
        source: BundleError,
    },
}

type ContextValue = Arc<dyn Any + Send + Sync>;

struct AppInner {
    config: AppConfig,
    host_config: ArcSwap<Value>,
    bundles: BundleRegistry,
    registry: Arc<Registry>,
    config_source: Arc<dyn ConfigSource>,
    renderer: Renderer,
    auth: HashMap<String, Arc<dyn AuthProvider>>,
    default_auth: Arc<dyn AuthProvider>,
    exception: Arc<dyn ErrorHandler>,
    context: DashMap<String, ContextValue>,
}

/// Shared application handle.
#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

impl App {
    pub fn builder(config: AppConfig) -> AppBuilder {
        AppBuilder::new(config)
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Snapshot of the free-form host configuration tree.
    pub fn host_config(&self) -> Arc<Value> {
        self.inner.host_config.load_full()
    }

    /// Fold a bundle's `core` fragments into the host tree. Values the host
    /// already holds win.
    pub fn merge_core(&self, core: &Map<String, Value>) {
        if core.is_empty() {
            return;
        }
        self.inner.host_config.rcu(|current| {
            let mut next = Value::clone(current);
            for (key, fragment) in core {
                merge_core_fragment(&mut next, key, fragment);
            }
            next
        });
        debug!(keys = core.len(), "Merged bundle core config");
    }

    pub fn bundles(&self) -> &BundleRegistry {
        &self.inner.bundles
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    pub fn controllers(&self) -> Arc<dyn ControllerSource> {
        self.inner.registry.clone()
    }

    pub fn config_source(&self) -> &Arc<dyn ConfigSource> {
        &self.inner.config_source
    }

    pub fn renderer(&self) -> &Renderer {
        &self.inner.renderer
    }

    /// Provider registered under `name`, or the anonymous default.
    pub fn auth_provider(&self, name: &str) -> Arc<dyn AuthProvider> {
        self.inner
            .auth
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.inner.default_auth.clone())
    }

    pub fn exception_handler(&self) -> Arc<dyn ErrorHandler> {
        self.inner.exception.clone()
    }

    /// Store `value` under `name`. A [`Value`] stored under `"config"`
    /// replaces the host configuration tree.
    pub fn set_app_context<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) {
        let name = name.into();
        let value: ContextValue = Arc::new(value);
        if name == CONFIG_CONTEXT_KEY {
            match value.downcast::<Value>() {
                Ok(tree) => self.inner.host_config.store(tree),
                Err(_) => warn!("App context \"config\" only holds the host config tree, value ignored"),
            }
            return;
        }
        self.inner.context.insert(name, value);
    }

    /// Value stored under `name`. `"config"` always reads the current host
    /// configuration tree.
    pub fn app_context<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let value: ContextValue = if name == CONFIG_CONTEXT_KEY {
            self.host_config() as ContextValue
        } else {
            self.inner.context.get(name)?.value().clone()
        };
        value.downcast::<T>().ok()
    }

    pub fn bundle_loader(&self) -> BundleLoader<'_> {
        BundleLoader::new(self)
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.clone())
    }

    /// Model factory `name` from the application tree or a bundle.
    pub fn import_model(&self, name: &str, bundle_name: Option<&str>) -> Result<ModelHandle, ModuleError> {
        let root = ModuleRoot::for_bundle(bundle_name.unwrap_or_default());
        self.inner.registry.model(&root, name)
    }

    /// Raw source of a view, relative to the application or bundle views
    /// directory.
    pub fn load_view(&self, view_path: &str, bundle_name: Option<&str>) -> Result<String, ViewError> {
        let path = Path::new(view_path);
        let file = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.views_dir(bundle_name).join(view_path.trim_start_matches('/'))
        };
        self.inner.renderer.engine().load(&file)
    }

    fn views_dir(&self, bundle_name: Option<&str>) -> PathBuf {
        let app_views = || self.config().layout.views.base_dir.clone().unwrap_or_default();
        let Some(name) = bundle_name.filter(|n| !n.is_empty()) else {
            return app_views();
        };
        if let Some(descriptor) = self.bundles().loaded(name) {
            return descriptor.views_dir();
        }
        self.bundles()
            .declared(name)
            .and_then(|conf| conf.base_dir)
            .map(|dir| dir.join("views"))
            .unwrap_or_else(app_views)
    }

    /// Create a service outside any request. Nothing is memoized.
    pub fn create_service<T: Any + Send + Sync>(&self, name: &str, opts: ServiceOptions) -> Result<Arc<T>, RouteError> {
        let request = ServiceRequest::resolve(self.config(), name, opts);
        let service = request.create(self, None)?;
        downcast(service, &request.service_name)
    }

    /// Request context bound to the application tree, for handlers running
    /// outside MVC dispatch.
    pub fn create_context(&self, exchange: &Exchange) -> RequestContext {
        RequestContext::detached(self, exchange)
    }

    /// Load every bundle flagged `preLoad`, trying the configured prefixes
    /// in order. A broken bundle aborts startup; a missing one is logged.
    pub fn preload_bundles(&self) -> Result<(), StartupError> {
        let prefixes = &self.config().third_party_bundle.prefixes;
        for name in self.bundles().preload_names() {
            let mut loaded = false;
            for prefix in prefixes {
                match self.bundle_loader().load(&name, prefix) {
                    Ok(_) => {
                        loaded = true;
                        break;
                    }
                    Err(source) if source.is_broken() => {
                        return Err(StartupError::Bundle { name, source });
                    }
                    Err(err) => {
                        debug!(bundle = %name, prefix = %prefix, error = %err, "Preload attempt missed");
                    }
                }
            }
            if !loaded {
                warn!(bundle = %name, "Failed to preload bundle, it will be loaded on demand");
            }
        }
        Ok(())
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("name", &self.inner.config.name)
            .field("env", &self.inner.config.env)
            .field("bundles", &self.inner.bundles.names())
            .finish()
    }
}

/// Assembles an [`App`].
pub struct AppBuilder {
    config: AppConfig,
    registry: Option<Registry>,
    views: Option<Arc<dyn ViewEngine>>,
    auth: HashMap<String, Arc<dyn AuthProvider>>,
    config_source: Option<Arc<dyn ConfigSource>>,
    host_config: Value,
    exception: Option<Arc<dyn ErrorHandler>>,
    context: Vec<(String, ContextValue)>,
}

impl AppBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            registry: None,
            views: None,
            auth: HashMap::new(),
            config_source: None,
            host_config: Value::Object(Map::new()),
            exception: None,
            context: Vec::new(),
        }
    }

    /// Module registry to resolve from. Defaults to every `inventory`
    /// submission in the binary.
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn views(mut self, engine: Arc<dyn ViewEngine>) -> Self {
        self.views = Some(engine);
        self
    }

    pub fn auth(mut self, name: impl Into<String>, provider: Arc<dyn AuthProvider>) -> Self {
        self.auth.insert(name.into(), provider);
        self
    }

    pub fn config_source(mut self, source: Arc<dyn ConfigSource>) -> Self {
        self.config_source = Some(source);
        self
    }

    /// Initial host configuration tree that bundle `core` fragments merge
    /// into.
    pub fn host_config(mut self, tree: Value) -> Self {
        self.host_config = tree;
        self
    }

    pub fn exception_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.exception = Some(handler);
        self
    }

    pub fn context<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.context.push((name.into(), Arc::new(value)));
        self
    }

    pub fn build(self) -> Result<App, StartupError> {
        let mut config = self.config;
        normalize(&mut config)?;
        validate_config(&config).map_err(ConfigError::Validation)?;

        let registry = self.registry.unwrap_or_else(Registry::discover);
        let engine = self
            .views
            .unwrap_or_else(|| Arc::new(PlainViewEngine::new(config.views.engine.clone())));
        let views_dir = config.layout.views.base_dir.clone().unwrap_or_default();

        let mut host_config = Arc::new(self.host_config);
        let context = DashMap::new();
        context.insert(PLUGIN_CONFIG_CONTEXT_KEY.to_string(), Arc::new(config.clone()) as ContextValue);
        for (name, value) in self.context {
            if name != CONFIG_CONTEXT_KEY {
                context.insert(name, value);
                continue;
            }
            match value.downcast::<Value>() {
                Ok(tree) => host_config = tree,
                Err(_) => warn!("App context \"config\" only holds the host config tree, value ignored"),
            }
        }

        let app = App {
            inner: Arc::new(AppInner {
                bundles: BundleRegistry::from_config(&config.bundles),
                host_config: ArcSwap::new(host_config),
                registry: Arc::new(registry),
                config_source: self.config_source.unwrap_or_else(|| Arc::new(TomlDirSource)),
                renderer: Renderer::new(engine, views_dir),
                auth: self.auth,
                default_auth: Arc::new(AnonymousAuth::default()),
                exception: self.exception.unwrap_or_else(|| Arc::new(JsonExceptionHandler)),
                context,
                config,
            }),
        };

        app.preload_bundles()?;
        info!(
            name = %app.config().name,
            env = %app.config().env,
            bundles = app.bundles().names().len(),
            "Application initialized"
        );
        Ok(app)
    }
}
