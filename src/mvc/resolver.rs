//! URL to controller/action resolution.
//!
//! A [`Resolution`] lives for one request. It rewrites its `url` as routing
//! prefixes and bundle names are stripped, first trying the application
//! controller tree, then one nested directory deeper. Bundle lookups rebind
//! the search roots to the bundle's own layout before resolving again.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::app::App;
use crate::bundle::{BundleDescriptor, BundleError};
use crate::config::AppConfig;
use crate::error::{ModuleError, RouteError};
use crate::mvc::controller::{ActionArgs, Controller};
use crate::mvc::naming::{action_method, controller_class, module_path, CONTROLLER_SUFFIX};
use crate::mvc::registry::{ControllerSource, ModuleRoot};

/// Result of [`split_url`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlSplit {
    /// Candidate that matched, empty when none did.
    pub first_seg: String,
    /// What is left of the URL after the matched segment.
    pub rest: String,
}

/// Match `url` against `candidates` in list order; the first candidate that
/// equals the URL or is a leading path segment of it wins.
///
/// This is first-match, not longest-match: with candidates `["a", "a/b"]` the
/// URL `a/b/c` always matches `a`.
pub fn split_url<I, S>(candidates: I, url: &str) -> UrlSplit
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for item in candidates {
        let item = item.as_ref();
        if item == url {
            return UrlSplit {
                first_seg: item.to_string(),
                rest: String::new(),
            };
        }
        if item.is_empty() {
            continue;
        }
        if let Some(rest) = url.strip_prefix(item).and_then(|r| r.strip_prefix('/')) {
            return UrlSplit {
                first_seg: item.to_string(),
                rest: rest.to_string(),
            };
        }
    }
    UrlSplit {
        first_seg: String::new(),
        rest: url.to_string(),
    }
}

/// Per-request resolution state.
pub struct Resolution {
    controllers: Arc<dyn ControllerSource>,

    pub url: String,
    pub original_url: String,
    pub bundle_name: String,
    pub bundle_prefix: String,
    pub rel_search_dir: String,
    pub controller_name: String,
    pub action_name: String,
    pub view_path: String,
    pub controller: Option<Box<dyn Controller>>,
    /// Index in `url_infos` where positional action arguments begin.
    pub url_param_pos: usize,
    pub url_infos: Vec<String>,
    /// Controller parameter bag seeded from the route mapping.
    pub init_params: Map<String, Value>,
    /// Final action arguments.
    pub params: ActionArgs,

    pub root: ModuleRoot,
    pub controllers_base_dir: PathBuf,
    pub views_base_dir: PathBuf,
    pub models_base_dir: PathBuf,
    pub configs_base_dir: PathBuf,

    urls_prefix: Vec<String>,
    auto_url_prefix: bool,
    default_controller_name: String,
    default_action_name: String,
}

impl Resolution {
    pub fn new(config: &AppConfig, controllers: Arc<dyn ControllerSource>) -> Self {
        let router = &config.router;
        Self {
            controllers,
            url: String::new(),
            original_url: String::new(),
            bundle_name: String::new(),
            bundle_prefix: String::new(),
            rel_search_dir: String::new(),
            controller_name: String::new(),
            action_name: String::new(),
            view_path: String::new(),
            controller: None,
            url_param_pos: 2,
            url_infos: Vec::new(),
            init_params: Map::new(),
            params: ActionArgs::default(),
            root: ModuleRoot::App,
            controllers_base_dir: dir_or_default(&config.layout.controllers.base_dir),
            views_base_dir: dir_or_default(&config.layout.views.base_dir),
            models_base_dir: dir_or_default(&config.layout.models.base_dir),
            configs_base_dir: dir_or_default(&config.layout.configs.base_dir),
            urls_prefix: router.urls_prefix.clone(),
            auto_url_prefix: router.auto_url_prefix,
            default_controller_name: router.default.controller_name.clone(),
            default_action_name: router.default.action_name.clone(),
        }
    }

    /// Start over on `url`, keeping any bundle binding.
    pub fn reset(&mut self, url: &str) {
        self.url = url.to_string();
        self.original_url = url.to_string();
        self.rel_search_dir.clear();
        self.url_param_pos = 2;
        self.url_infos.clear();
        self.controller = None;
    }

    pub fn auto_url_prefix(&self) -> bool {
        self.auto_url_prefix
    }

    pub fn urls_prefix(&self) -> &[String] {
        &self.urls_prefix
    }

    pub fn default_names(&self) -> (&str, &str) {
        (&self.default_controller_name, &self.default_action_name)
    }

    /// Resolve the current `url` to a controller instance.
    ///
    /// Failures are returned, not raised, so the caller can go on to try
    /// bundles. A broken controller ends the search immediately.
    pub fn load_controller(&mut self) -> Result<(), RouteError> {
        if !self.auto_url_prefix {
            let split = split_url(&self.urls_prefix, &self.url);
            self.rel_search_dir = split.first_seg;
            self.url = split.rest;
        }

        let mut url_infos: Vec<String> = self.url.split('/').map(str::to_string).collect();
        if url_infos[0].is_empty() {
            url_infos[0] = self.default_controller_name.clone();
        }
        match url_infos.get_mut(1) {
            Some(seg) if seg.is_empty() => *seg = self.default_action_name.clone(),
            Some(_) => {}
            None => url_infos.push(self.default_action_name.clone()),
        }

        if self.auto_url_prefix {
            let mut parts: Vec<&str> = url_infos[0].split('_').collect();
            let controller = parts.pop().unwrap_or_default().to_string();
            self.rel_search_dir = parts.join("/");
            url_infos[0] = controller;
        }

        if let Err(err) = self.require_controller(&url_infos[0], url_infos.get(1).map(String::as_str)) {
            if err.is_compile() || self.auto_url_prefix {
                return Err(err);
            }
            self.rel_search_dir = format!("{}/{}", self.rel_search_dir, url_infos[0]);
            self.require_controller(&url_infos[1], url_infos.get(2).map(String::as_str))?;
            self.url_param_pos = 3;
        }

        tracing::debug!(
            root = ?self.root,
            search_dir = %self.rel_search_dir,
            controller = %self.controller_name,
            action = %self.action_name,
            "Controller resolved"
        );
        self.url_infos = url_infos;
        Ok(())
    }

    fn require_controller(&mut self, controller_key: &str, action_key: Option<&str>) -> Result<(), RouteError> {
        let controller_key = if controller_key.is_empty() {
            self.default_controller_name.clone()
        } else {
            controller_key.to_string()
        };
        let action_key = match action_key {
            Some(a) if !a.is_empty() => a.to_string(),
            _ => self.default_action_name.clone(),
        };

        self.controller_name = controller_class(&controller_key);
        let key = module_path(
            &self.rel_search_dir,
            &format!("{}{}", self.controller_name, CONTROLLER_SUFFIX),
        );
        let handle = self
            .controllers
            .resolve(&self.root, &key)
            .ok_or_else(|| ModuleError::NotFound(self.root.describe(&key)))?;
        self.controller = Some(handle.instantiate()?);

        self.action_name = action_method(&action_key);
        let view_path = format!("{}/{}/{}", self.rel_search_dir, controller_key, self.action_name);
        let view_path = view_path.strip_prefix('/').unwrap_or(&view_path);
        self.view_path = if self.bundle_name.is_empty() {
            view_path.to_string()
        } else {
            self.views_base_dir.join(view_path).to_string_lossy().into_owned()
        };
        Ok(())
    }

    /// Load bundle `name` through `prefix` and rebind the search roots to it.
    pub fn load_bundle(
        &mut self,
        app: &App,
        name: &str,
        prefix: &str,
    ) -> Result<Arc<BundleDescriptor>, BundleError> {
        self.bundle_prefix = prefix.to_string();
        let descriptor = app.bundle_loader().load(name, prefix)?;
        self.bind_bundle(&descriptor);
        Ok(descriptor)
    }

    /// Point the search roots and routing defaults at a loaded bundle. Only
    /// defaults the bundle declares replace the current ones.
    pub fn bind_bundle(&mut self, descriptor: &BundleDescriptor) {
        self.bundle_name = descriptor.name.clone();
        self.root = ModuleRoot::Bundle(descriptor.name.clone());

        let base = &descriptor.base_dir;
        self.configs_base_dir = base.join("config");
        self.controllers_base_dir = base.join("controllers");
        self.views_base_dir = base.join("views");
        self.models_base_dir = base.join("models");

        let defaults = &descriptor.defaults;
        if let Some(prefixes) = &defaults.urls_prefix {
            self.urls_prefix = prefixes.clone();
        }
        if let Some(auto) = defaults.auto_url_prefix {
            self.auto_url_prefix = auto;
        }
        if let Some(name) = &defaults.controller_name {
            self.default_controller_name = name.clone();
        }
        if let Some(name) = &defaults.action_name {
            self.default_action_name = name.clone();
        }
    }

    /// URL segments after `url_param_pos`.
    pub fn positional_tail(&self) -> Vec<Option<String>> {
        self.url_infos
            .iter()
            .skip(self.url_param_pos)
            .map(|s| Some(s.clone()))
            .collect()
    }
}

fn dir_or_default(dir: &Option<PathBuf>) -> PathBuf {
    dir.clone().unwrap_or_default()
}
