//! Module registry: the lookup tables controllers, models, bundles and code
//! routes are resolved from.
//!
//! Keys mirror the on-disk layout a project would have (`blog/PostController`
//! under the application or a bundle root). Entries come from `inventory`
//! submissions collected at startup, or from explicit `register_*` calls.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::app::App;
use crate::bundle::BundleDescriptor;
use crate::context::ServiceInit;
use crate::dispatch::Routes;
use crate::error::ModuleError;
use crate::mvc::controller::Controller;
use crate::mvc::naming::module_path;

/// Tree a controller or model lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleRoot {
    App,
    Bundle(String),
}

impl ModuleRoot {
    pub fn for_bundle(bundle_name: &str) -> Self {
        if bundle_name.is_empty() {
            ModuleRoot::App
        } else {
            ModuleRoot::Bundle(bundle_name.to_string())
        }
    }

    /// Human readable location of `key` in this root.
    pub fn describe(&self, key: &str) -> String {
        match self {
            ModuleRoot::App => key.to_string(),
            ModuleRoot::Bundle(name) => format!("{}::{}", name, key),
        }
    }
}

type ControllerFactory = dyn Fn() -> Result<Box<dyn Controller>, ModuleError> + Send + Sync;

/// Constructor for a controller.
#[derive(Clone)]
pub struct ControllerHandle {
    factory: Arc<ControllerFactory>,
}

impl ControllerHandle {
    pub fn new<C, F>(factory: F) -> Self
    where
        C: Controller,
        F: Fn() -> C + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(move || Ok(Box::new(factory()) as Box<dyn Controller>)),
        }
    }

    pub fn fallible<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Controller>, ModuleError> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
        }
    }

    /// A controller that exists but cannot be constructed.
    pub fn broken(module: impl Into<String>, reason: impl Into<String>) -> Self {
        let module = module.into();
        let reason = reason.into();
        Self::fallible(move || {
            Err(ModuleError::Broken {
                module: module.clone(),
                reason: reason.clone(),
            })
        })
    }

    pub fn instantiate(&self) -> Result<Box<dyn Controller>, ModuleError> {
        (self.factory)()
    }
}

impl fmt::Debug for ControllerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ControllerHandle")
    }
}

pub type ServiceObject = Arc<dyn Any + Send + Sync>;
type ModelFactory = dyn Fn(ServiceInit) -> Result<ServiceObject, ModuleError> + Send + Sync;

/// Constructor for a model; instantiated models are the services handed out
/// by `get_service`.
#[derive(Clone)]
pub struct ModelHandle {
    factory: Arc<ModelFactory>,
}

impl ModelHandle {
    pub fn new<T, F>(factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(ServiceInit) -> T + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(move |init| Ok(Arc::new(factory(init)) as ServiceObject)),
        }
    }

    pub fn fallible<F>(factory: F) -> Self
    where
        F: Fn(ServiceInit) -> Result<ServiceObject, ModuleError> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
        }
    }

    pub fn create(&self, init: ServiceInit) -> Result<ServiceObject, ModuleError> {
        (self.factory)(init)
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ModelHandle")
    }
}

type LoadedHook = dyn Fn(&App, &BundleDescriptor) + Send + Sync;

/// What a bundle module hands back when it is required.
#[derive(Clone, Default)]
pub struct BundleObject {
    pub base_dir: Option<PathBuf>,
    pub config_base_dir: Option<PathBuf>,
    pub controllers: Vec<(String, ControllerHandle)>,
    pub models: Vec<(String, ModelHandle)>,
    pub on_loaded: Option<Arc<LoadedHook>>,
}

impl BundleObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    pub fn with_config_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_base_dir = Some(dir.into());
        self
    }

    pub fn controller(mut self, path: impl Into<String>, handle: ControllerHandle) -> Self {
        self.controllers.push((path.into(), handle));
        self
    }

    pub fn model(mut self, name: impl Into<String>, handle: ModelHandle) -> Self {
        self.models.push((name.into(), handle));
        self
    }

    pub fn on_loaded<F>(mut self, hook: F) -> Self
    where
        F: Fn(&App, &BundleDescriptor) + Send + Sync + 'static,
    {
        self.on_loaded = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for BundleObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleObject")
            .field("base_dir", &self.base_dir)
            .field("config_base_dir", &self.config_base_dir)
            .field("controllers", &self.controllers.len())
            .field("models", &self.models.len())
            .finish()
    }
}

type BundleFactory = dyn Fn(&App) -> Result<BundleObject, ModuleError> + Send + Sync;

/// How a bundle module exports itself.
#[derive(Clone)]
pub enum BundleExport {
    /// Called with the host app to build the bundle object.
    Factory(Arc<BundleFactory>),
    /// A ready-made bundle object.
    Object(BundleObject),
}

/// Registry key of a bundle module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BundleModuleKey {
    /// Installed module, found as `prefix + name` or an explicit module name.
    Named(String),
    /// Entry of a bundle living in the project's bundles directory.
    InTree(String),
}

#[derive(Clone)]
pub struct BundleModule {
    pub key: BundleModuleKey,
    /// Where the module lives; the default source root is `location/src`.
    pub location: Option<PathBuf>,
    pub export: BundleExport,
}

impl BundleModule {
    pub fn named(name: impl Into<String>, export: BundleExport) -> Self {
        Self {
            key: BundleModuleKey::Named(name.into()),
            location: None,
            export,
        }
    }

    pub fn in_tree(bundle_name: impl Into<String>, export: BundleExport) -> Self {
        Self {
            key: BundleModuleKey::InTree(bundle_name.into()),
            location: None,
            export,
        }
    }

    pub fn at(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn factory<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&App) -> Result<BundleObject, ModuleError> + Send + Sync + 'static,
    {
        Self::named(name, BundleExport::Factory(Arc::new(factory)))
    }

    pub fn object(name: impl Into<String>, object: BundleObject) -> Self {
        Self::named(name, BundleExport::Object(object))
    }

    /// Produce the bundle object, invoking the factory if there is one.
    pub fn require(&self, app: &App) -> Result<BundleObject, ModuleError> {
        match &self.export {
            BundleExport::Factory(factory) => factory(app),
            BundleExport::Object(object) => Ok(object.clone()),
        }
    }
}

impl fmt::Debug for BundleModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleModule")
            .field("key", &self.key)
            .field("location", &self.location)
            .finish()
    }
}

pub type RouteInstaller = Arc<dyn Fn(&mut Routes<'_>) + Send + Sync>;

/// Lookup contract used by the resolver.
pub trait ControllerSource: Send + Sync {
    fn resolve(&self, root: &ModuleRoot, key: &str) -> Option<ControllerHandle>;
}

/// `inventory` submission for a controller.
pub struct ControllerRegistration {
    /// Owning bundle, `None` for the application tree.
    pub bundle: Option<&'static str>,
    /// `dir/NameController`.
    pub path: &'static str,
    pub factory: fn() -> Box<dyn Controller>,
}
inventory::collect!(ControllerRegistration);

/// `inventory` submission for a model.
pub struct ModelRegistration {
    pub bundle: Option<&'static str>,
    pub name: &'static str,
    pub factory: fn(ServiceInit) -> Result<ServiceObject, ModuleError>,
}
inventory::collect!(ModelRegistration);

/// `inventory` submission for a bundle module.
pub struct BundleRegistration {
    pub module: &'static str,
    pub in_tree: bool,
    pub location: Option<&'static str>,
    pub build: fn(&App) -> Result<BundleObject, ModuleError>,
}
inventory::collect!(BundleRegistration);

/// `inventory` submission for code-defined routes.
pub struct RouteRegistration {
    pub install: fn(&mut Routes<'_>),
}
inventory::collect!(RouteRegistration);

#[derive(Default)]
pub struct Registry {
    controllers: RwLock<HashMap<(ModuleRoot, String), ControllerHandle>>,
    models: RwLock<HashMap<(ModuleRoot, String), ModelHandle>>,
    bundles: RwLock<HashMap<BundleModuleKey, BundleModule>>,
    routes: RwLock<Vec<RouteInstaller>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-filled with every `inventory` submission in the binary.
    pub fn discover() -> Self {
        let registry = Self::new();

        for reg in inventory::iter::<ControllerRegistration> {
            let factory = reg.factory;
            registry.register_controller(
                root_of(reg.bundle),
                reg.path,
                ControllerHandle::fallible(move || Ok(factory())),
            );
        }
        for reg in inventory::iter::<ModelRegistration> {
            registry.register_model(root_of(reg.bundle), reg.name, ModelHandle::fallible(reg.factory));
        }
        for reg in inventory::iter::<BundleRegistration> {
            let build = reg.build;
            let export = BundleExport::Factory(Arc::new(build));
            let mut module = if reg.in_tree {
                BundleModule::in_tree(reg.module, export)
            } else {
                BundleModule::named(reg.module, export)
            };
            module.location = reg.location.map(PathBuf::from);
            registry.register_bundle(module);
        }
        for reg in inventory::iter::<RouteRegistration> {
            let install = reg.install;
            registry.register_routes(install);
        }

        tracing::debug!(
            controllers = registry.controllers.read().len(),
            models = registry.models.read().len(),
            bundles = registry.bundles.read().len(),
            "Module registry discovered"
        );
        registry
    }

    pub fn register_controller(&self, root: ModuleRoot, path: &str, handle: ControllerHandle) {
        let key = module_path("", path);
        self.controllers.write().insert((root, key), handle);
    }

    pub fn register_model(&self, root: ModuleRoot, name: &str, handle: ModelHandle) {
        let key = module_path("", name);
        self.models.write().insert((root, key), handle);
    }

    pub fn register_bundle(&self, module: BundleModule) {
        self.bundles.write().insert(module.key.clone(), module);
    }

    pub fn register_routes<F>(&self, install: F)
    where
        F: Fn(&mut Routes<'_>) + Send + Sync + 'static,
    {
        self.routes.write().push(Arc::new(install));
    }

    pub fn model(&self, root: &ModuleRoot, name: &str) -> Result<ModelHandle, ModuleError> {
        let key = module_path("", name);
        self.models
            .read()
            .get(&(root.clone(), key.clone()))
            .cloned()
            .ok_or_else(|| ModuleError::NotFound(root.describe(&key)))
    }

    pub fn bundle_module(&self, key: &BundleModuleKey) -> Option<BundleModule> {
        self.bundles.read().get(key).cloned()
    }

    pub fn route_installers(&self) -> Vec<RouteInstaller> {
        self.routes.read().clone()
    }
}

impl ControllerSource for Registry {
    fn resolve(&self, root: &ModuleRoot, key: &str) -> Option<ControllerHandle> {
        self.controllers
            .read()
            .get(&(root.clone(), module_path("", key)))
            .cloned()
    }
}

fn root_of(bundle: Option<&'static str>) -> ModuleRoot {
    bundle.map(ModuleRoot::for_bundle).unwrap_or(ModuleRoot::App)
}

/// Register a controller with the application (or a bundle) at build time.
///
/// ```ignore
/// register_controller!("blog/PostController", || Box::new(PostController));
/// register_controller!(bundle "shop", "CartController", || Box::new(CartController));
/// ```
#[macro_export]
macro_rules! register_controller {
    (bundle $bundle:literal, $path:literal, $factory:expr) => {
        $crate::inventory::submit! {
            $crate::mvc::ControllerRegistration {
                bundle: Some($bundle),
                path: $path,
                factory: $factory,
            }
        }
    };
    ($path:literal, $factory:expr) => {
        $crate::inventory::submit! {
            $crate::mvc::ControllerRegistration {
                bundle: None,
                path: $path,
                factory: $factory,
            }
        }
    };
}
