//! Bundle loading.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::app::App;
use crate::bundle::{BundleDescriptor, BundleError};
use crate::config::merge::deep_merge;
use crate::config::BundleConfig;
use crate::error::ModuleError;
use crate::mvc::registry::{BundleModule, BundleModuleKey, BundleObject, ModuleRoot};
use crate::observability::metrics;

/// Prefix that selects the in-tree form of a bundle.
pub const IN_TREE_PREFIX: &str = "*";

/// Loads bundles for one [`App`].
pub struct BundleLoader<'a> {
    app: &'a App,
}

impl<'a> BundleLoader<'a> {
    pub fn new(app: &'a App) -> Self {
        Self { app }
    }

    /// Load `name` through module prefix `prefix`.
    ///
    /// Returns the cached descriptor when the bundle is already loaded; the
    /// module factory, config merge and post-load hook run once per name.
    pub fn load(&self, name: &str, prefix: &str) -> Result<Arc<BundleDescriptor>, BundleError> {
        let bundles = self.app.bundles();
        if let Some(descriptor) = bundles.loaded(name) {
            return Ok(descriptor);
        }

        let _gate = bundles.lock_loading();
        if let Some(descriptor) = bundles.loaded(name) {
            return Ok(descriptor);
        }

        match self.load_uncached(name, prefix) {
            Ok(descriptor) => {
                bundles.insert_loaded(descriptor.clone());
                metrics::record_bundle_load(name, "loaded");
                tracing::info!(
                    bundle = %name,
                    prefix = %prefix,
                    base_dir = %descriptor.base_dir.display(),
                    "Bundle loaded"
                );
                Ok(descriptor)
            }
            Err(err) => {
                let outcome = if err.is_broken() { "broken" } else { "not_found" };
                metrics::record_bundle_load(name, outcome);
                Err(err)
            }
        }
    }

    fn load_uncached(&self, name: &str, prefix: &str) -> Result<Arc<BundleDescriptor>, BundleError> {
        let declared = self.app.bundles().declared(name).unwrap_or_default();
        let (module, object) = self.require(name, prefix, &declared)?;

        let base_dir = object
            .base_dir
            .clone()
            .or_else(|| declared.base_dir.clone())
            .or_else(|| module.as_ref().and_then(|m| m.location.as_ref()).map(|l| l.join("src")))
            .or_else(|| self.local_module_dir(name, prefix, &declared))
            .ok_or_else(|| BundleError::NoBaseDir(name.to_string()))?;
        let config_base_dir = object
            .config_base_dir
            .clone()
            .or_else(|| declared.config_base_dir.clone())
            .unwrap_or_else(|| base_dir.join("config"));

        let tree = self.config_tree(&declared, &base_dir, &config_base_dir)?;
        let descriptor = BundleDescriptor::from_tree(name, tree).map_err(BundleError::Descriptor)?;

        self.app.merge_core(&descriptor.core);
        self.install(name, &object);
        if let Some(hook) = &object.on_loaded {
            hook(self.app, &descriptor);
        }
        Ok(Arc::new(descriptor))
    }

    /// Find and require the bundle module. In-tree bundles without a
    /// registered entry load as plain directories.
    fn require(
        &self,
        name: &str,
        prefix: &str,
        declared: &BundleConfig,
    ) -> Result<(Option<BundleModule>, BundleObject), BundleError> {
        let registry = self.app.registry();

        let module = if prefix == IN_TREE_PREFIX {
            let base_dir = declared
                .base_dir
                .as_ref()
                .ok_or_else(|| BundleError::NoBaseDir(name.to_string()))?;
            let module = registry
                .bundle_module(&BundleModuleKey::InTree(name.to_string()))
                .ok_or_else(|| ModuleError::NotFound(base_dir.join("index").display().to_string()))?;
            Some(module)
        } else if declared.base_dir.is_some() && declared.module_name.is_none() {
            registry.bundle_module(&BundleModuleKey::InTree(name.to_string()))
        } else {
            let module_name = declared
                .module_name
                .clone()
                .unwrap_or_else(|| format!("{}{}", prefix, name));
            let module = registry
                .bundle_module(&BundleModuleKey::Named(module_name.clone()))
                .ok_or(ModuleError::NotFound(module_name))?;
            Some(module)
        };

        let object = match &module {
            Some(module) => module.require(self.app)?,
            None => BundleObject::default(),
        };
        Ok((module, object))
    }

    fn local_module_dir(&self, name: &str, prefix: &str, declared: &BundleConfig) -> Option<PathBuf> {
        let root = self.app.config().local_module_base_dir.as_ref()?;
        let module_name = declared
            .module_name
            .clone()
            .unwrap_or_else(|| format!("{}{}", prefix, name));
        Some(root.join(module_name).join("src"))
    }

    /// Bundle config tree with the host's declared overrides merged on top.
    fn config_tree(
        &self,
        declared: &BundleConfig,
        base_dir: &Path,
        config_base_dir: &Path,
    ) -> Result<Value, BundleError> {
        let env = &self.app.config().env;
        let mut tree = self.app.config_source().load(config_base_dir, env)?;
        if !tree.is_object() {
            tree = Value::Object(Map::new());
        }
        if let Value::Object(map) = &mut tree {
            map.remove("loadPlugins");
            map.entry("default").or_insert_with(|| Value::Object(Map::new()));
            map.entry("core").or_insert_with(|| Value::Object(Map::new()));
            map.insert("isLoaded".to_string(), Value::Bool(true));
        }

        let mut overrides =
            serde_json::to_value(declared).map_err(|e| BundleError::Config(e.into()))?;
        if let Value::Object(map) = &mut overrides {
            map.insert("baseDir".into(), Value::String(base_dir.display().to_string()));
            map.insert(
                "configBaseDir".into(),
                Value::String(config_base_dir.display().to_string()),
            );
        }
        deep_merge(&mut tree, overrides);
        Ok(tree)
    }

    fn install(&self, name: &str, object: &BundleObject) {
        let registry = self.app.registry();
        let root = ModuleRoot::Bundle(name.to_string());
        for (path, handle) in &object.controllers {
            registry.register_controller(root.clone(), path, handle.clone());
        }
        for (model, handle) in &object.models {
            registry.register_model(root.clone(), model, handle.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::error::ModuleError;
    use crate::mvc::controller::FnController;
    use crate::mvc::registry::{ControllerHandle, ControllerSource, Registry};
    use serde_json::json;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn app_with(registry: Registry, config: AppConfig) -> App {
        App::builder(config).registry(registry).build().unwrap()
    }

    fn base_config(dir: &Path) -> AppConfig {
        AppConfig::with_base_dir(dir)
    }

    #[test]
    fn test_load_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let shop_dir = dir.path().join("vendor/shop");
        fs::create_dir_all(shop_dir.join("config")).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let registry = Registry::new();
        let src = shop_dir.clone();
        registry.register_bundle(BundleModule::factory("bootjs-bundle-shop", move |_app| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(BundleObject::new()
                .with_base_dir(src.clone())
                .controller("CartController", ControllerHandle::new(FnController::new)))
        }));
        let app = app_with(registry, base_config(dir.path()));

        let first = app.bundle_loader().load("shop", "bootjs-bundle-").unwrap();
        let second = app.bundle_loader().load("shop", "bootjs-bundle-").unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.base_dir, second.base_dir);
        assert_eq!(first.config_base_dir, second.config_base_dir);
        assert_eq!(first.config_base_dir, shop_dir.join("config"));
        assert!(first.is_loaded);
        assert!(app
            .registry()
            .resolve(&ModuleRoot::Bundle("shop".into()), "CartController")
            .is_some());
    }

    #[test]
    fn test_missing_module_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(Registry::new(), base_config(dir.path()));

        let err = app.bundle_loader().load("blog", "bootjs-bundle-").unwrap_err();
        assert!(matches!(
            err,
            BundleError::Module(ModuleError::NotFound(ref m)) if m == "bootjs-bundle-blog"
        ));
        assert!(!err.is_broken());
    }

    #[test]
    fn test_in_tree_prefix_requires_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(Registry::new(), base_config(dir.path()));

        let err = app.bundle_loader().load("ghost", IN_TREE_PREFIX).unwrap_err();
        assert!(matches!(err, BundleError::NoBaseDir(ref n) if n == "ghost"));
    }

    #[test]
    fn test_broken_factory() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new();
        registry.register_bundle(BundleModule::factory("shop", |_app| {
            Err(ModuleError::Broken {
                module: "shop".into(),
                reason: "unexpected token".into(),
            })
        }));
        let app = app_with(registry, base_config(dir.path()));

        let err = app.bundle_loader().load("shop", "").unwrap_err();
        assert!(err.is_broken());
        assert!(app.bundles().loaded("shop").is_none());
    }

    #[test]
    fn test_config_merge_and_core() {
        let dir = tempfile::tempdir().unwrap();
        let bundle_dir = dir.path().join("bundles/shop");
        fs::create_dir_all(bundle_dir.join("config")).unwrap();
        fs::write(
            bundle_dir.join("config/config.toml"),
            r#"
                entryPath = "/store"
                loadPlugins = ["x"]

                [default]
                controllerName = "home"

                [core."db.pool"]
                timeout = 30
                size = 4
            "#,
        )
        .unwrap();

        let mut config = base_config(dir.path());
        config.bundles.insert(
            "shop".into(),
            BundleConfig {
                entry_path: Some("/shop".into()),
                ..Default::default()
            },
        );
        let app = App::builder(config)
            .host_config(json!({"db": {"pool": {"timeout": 10}}}))
            .build()
            .unwrap();

        let descriptor = app.bundle_loader().load("shop", "bootjs-bundle-").unwrap();
        assert_eq!(descriptor.entry_path, "/shop");
        assert_eq!(descriptor.defaults.controller_name.as_deref(), Some("home"));
        assert!(descriptor.settings.get("loadPlugins").is_none());
        assert_eq!(
            app.host_config()["db"]["pool"],
            json!({"timeout": 10, "size": 4})
        );
    }
}
