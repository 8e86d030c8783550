use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Routing defaults a bundle may declare under `default`. Unset fields keep
/// the host's values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BundleDefaults {
    pub urls_prefix: Option<Vec<String>>,
    pub auto_url_prefix: Option<bool>,
    pub controller_name: Option<String>,
    pub action_name: Option<String>,
}

/// A loaded bundle.
#[derive(Debug, Clone, Default)]
pub struct BundleDescriptor {
    pub name: String,
    pub base_dir: PathBuf,
    pub config_base_dir: PathBuf,
    pub is_loaded: bool,
    pub pre_load: bool,
    pub module_name: Option<String>,
    /// Dotted host config path → fragment merged into the host config.
    pub core: Map<String, Value>,
    pub defaults: BundleDefaults,
    pub entry_path: String,
    pub base_url: Option<String>,
    pub layout_path: Option<String>,
    pub html_layout_path: Option<String>,
    /// The full merged bundle config tree.
    pub settings: Value,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct Tree {
    base_dir: Option<PathBuf>,
    config_base_dir: Option<PathBuf>,
    is_loaded: bool,
    pre_load: bool,
    module_name: Option<String>,
    core: Map<String, Value>,
    #[serde(rename = "default")]
    defaults: BundleDefaults,
    entry_path: Option<String>,
    base_url: Option<String>,
    layout_path: Option<String>,
    html_layout_path: Option<String>,
}

impl BundleDescriptor {
    /// Build from a merged bundle config tree.
    pub fn from_tree(name: &str, tree: Value) -> Result<Self, serde_json::Error> {
        let parsed = Tree::deserialize(&tree)?;
        let base_dir = parsed.base_dir.unwrap_or_default();
        let config_base_dir = parsed
            .config_base_dir
            .unwrap_or_else(|| base_dir.join("config"));

        Ok(Self {
            name: name.to_string(),
            base_dir,
            config_base_dir,
            is_loaded: parsed.is_loaded,
            pre_load: parsed.pre_load,
            module_name: parsed.module_name,
            core: parsed.core,
            defaults: parsed.defaults,
            entry_path: parsed.entry_path.unwrap_or_default(),
            base_url: parsed.base_url,
            layout_path: parsed.layout_path,
            html_layout_path: parsed.html_layout_path,
            settings: tree,
        })
    }

    /// Layout used for HTML rendering inside this bundle.
    pub fn default_layout(&self) -> Option<&str> {
        self.html_layout_path.as_deref().or(self.layout_path.as_deref())
    }

    pub fn views_dir(&self) -> PathBuf {
        self.base_dir.join("views")
    }

    pub fn models_dir(&self) -> PathBuf {
        self.base_dir.join("models")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_tree() {
        let tree = json!({
            "baseDir": "/srv/shop",
            "isLoaded": true,
            "entryPath": "/shop",
            "layoutPath": "layout",
            "default": {"controllerName": "home", "autoUrlPrefix": true},
            "core": {"db.pool": {"size": 4}},
            "custom": 1
        });
        let d = BundleDescriptor::from_tree("shop", tree).unwrap();

        assert_eq!(d.base_dir, PathBuf::from("/srv/shop"));
        assert_eq!(d.config_base_dir, PathBuf::from("/srv/shop/config"));
        assert!(d.is_loaded);
        assert_eq!(d.entry_path, "/shop");
        assert_eq!(d.default_layout(), Some("layout"));
        assert_eq!(d.defaults.controller_name.as_deref(), Some("home"));
        assert_eq!(d.defaults.auto_url_prefix, Some(true));
        assert_eq!(d.defaults.action_name, None);
        assert_eq!(d.core["db.pool"], json!({"size": 4}));
        assert_eq!(d.settings["custom"], 1);
    }
}
