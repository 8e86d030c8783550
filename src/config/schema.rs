//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files and
//! use camelCase keys (`router.urlsMapping`, `thirdPartyBundle.prefixes`, ...).

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Root configuration of the MVC routing layer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    /// Name the application registers itself under in the app context.
    pub name: String,

    /// Environment tag handed to the bundle config loader.
    pub env: String,

    /// Project root. Required; every layout directory defaults below it.
    pub base_dir: Option<PathBuf>,

    pub router: RouterConfig,

    pub layout: LayoutConfig,

    pub views: ViewsConfig,

    /// Bundles declared explicitly or discovered under `layout.bundles`.
    pub bundles: IndexMap<String, BundleConfig>,

    pub third_party_bundle: ThirdPartyBundleConfig,

    /// Root used when reporting locally installed bundle modules.
    pub local_module_base_dir: Option<PathBuf>,

    pub auth: AuthConfig,

    pub exception: ExceptionConfig,

    /// Named service overrides consulted by `get_service`.
    pub services: IndexMap<String, ServiceConfig>,

    pub listener: ListenerConfig,

    pub timeouts: TimeoutConfig,

    pub observability: ObservabilityConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "bootjs".to_string(),
            env: "prod".to_string(),
            base_dir: None,
            router: RouterConfig::default(),
            layout: LayoutConfig::default(),
            views: ViewsConfig::default(),
            bundles: IndexMap::new(),
            third_party_bundle: ThirdPartyBundleConfig::default(),
            local_module_base_dir: None,
            auth: AuthConfig::default(),
            exception: ExceptionConfig::default(),
            services: IndexMap::new(),
            listener: ListenerConfig::default(),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl AppConfig {
    /// Default configuration rooted at `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
            ..Self::default()
        }
    }
}

/// URL routing settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RouterConfig {
    /// Declarative URL mappings, in declaration order.
    pub urls_mapping: IndexMap<String, MappingEntry>,

    pub default: RouteDefaults,

    /// Known URL prefixes. Matched first-come, so list specific ones first.
    pub urls_prefix: Vec<String>,

    /// Derive nested controller directories from `a_b_controller` segments.
    pub auto_url_prefix: bool,
}

/// Default routing values.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RouteDefaults {
    pub bundle_name: String,
    pub controller_name: String,
    pub action_name: String,
}

impl Default for RouteDefaults {
    fn default() -> Self {
        Self {
            bundle_name: String::new(),
            controller_name: "index".to_string(),
            action_name: "index".to_string(),
        }
    }
}

/// A `router.urlsMapping` value: either a bare target or a full mapping.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MappingEntry {
    Target(String),
    Detailed(MappingConfig),
}

/// Full form of a URL mapping entry.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MappingConfig {
    pub source: Option<String>,
    pub target: Option<String>,
    pub method: Option<String>,
    /// `"regexp"` compiles `source` as a regular expression.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub param_seq: Option<Vec<Option<String>>>,
    /// Initial controller parameters.
    pub params: Map<String, Value>,
    pub auth: Option<AuthSetting>,
}

/// Per-route auth: `true`/`false` or a table.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AuthSetting {
    Flag(bool),
    Detailed(RouteAuthConfig),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RouteAuthConfig {
    pub enabled: bool,
    pub module: Option<String>,
    pub ajax: bool,
    pub ajax_failure_url: Option<String>,
    pub web_failure_url: Option<String>,
}

/// Directory layout of the project.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub controllers: DirConfig,
    pub views: DirConfig,
    pub models: DirConfig,
    pub configs: DirConfig,
    pub bundles: DirConfig,
    pub middlewares: DirConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DirConfig {
    pub base_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ViewsConfig {
    /// View file extension used by the default engine.
    pub engine: String,
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            engine: "html".to_string(),
        }
    }
}

/// Per-bundle settings. Unknown keys are kept in `extra` and merged into the
/// bundle descriptor at load time.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BundleConfig {
    pub base_dir: Option<PathBuf>,
    pub config_base_dir: Option<PathBuf>,
    pub pre_load: bool,
    /// Explicit module name, bypassing `prefix + name`.
    pub module_name: Option<String>,
    pub entry_path: Option<String>,
    pub base_url: Option<String>,
    pub layout_path: Option<String>,
    pub html_layout_path: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ThirdPartyBundleConfig {
    /// Module-name prefixes tried in order; `*` means the in-tree bundle.
    pub prefixes: Vec<String>,
    pub is_local: bool,
}

impl Default for ThirdPartyBundleConfig {
    fn default() -> Self {
        Self {
            prefixes: vec!["bootjs-bundle-".to_string(), String::new(), "*".to_string()],
            is_local: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthConfig {
    pub enabled: bool,
    pub module: String,
    pub ajax_failure_url: Option<String>,
    pub web_failure_url: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            module: "bootjs-auth".to_string(),
            ajax_failure_url: None,
            web_failure_url: None,
        }
    }
}

/// Exception middleware settings. Accepts `exception = false` as shorthand.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(from = "ExceptionSetting", rename_all = "camelCase")]
pub struct ExceptionConfig {
    pub enabled: bool,
    pub module: String,
}

impl Default for ExceptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            module: "bootjs-exception".to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExceptionSetting {
    Flag(bool),
    Detailed {
        #[serde(default)]
        enabled: Option<bool>,
        #[serde(default)]
        module: Option<String>,
    },
}

impl From<ExceptionSetting> for ExceptionConfig {
    fn from(setting: ExceptionSetting) -> Self {
        let defaults = ExceptionConfig::default();
        match setting {
            ExceptionSetting::Flag(enabled) => Self { enabled, ..defaults },
            ExceptionSetting::Detailed { enabled, module } => Self {
                enabled: enabled != Some(false),
                module: module.unwrap_or(defaults.module),
            },
        }
    }
}

/// Named service override.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceConfig {
    pub service_name: Option<String>,
    #[serde(alias = "bundle")]
    pub bundle_name: Option<String>,
    #[serde(alias = "module")]
    pub module_name: Option<String>,
    pub params: Option<Map<String, Value>>,
    pub reload: bool,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 2 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_documented_keys() {
        let config: AppConfig = toml::from_str(
            r#"
            baseDir = "/srv/app/"
            exception = false

            [router]
            urlsPrefix = ["/admin/", "api"]
            autoUrlPrefix = false

            [router.urlsMapping]
            "/about" = "page/about"
            "/post/:id" = { target = "blog/show", paramSeq = ["id"], auth = true }

            [bundles.shop]
            preLoad = true
            entryPath = "/shop"
            theme = "dark"

            [services.mailer]
            bundle = "shop"
            reload = true
            "#,
        )
        .unwrap();

        assert_eq!(config.base_dir.as_deref(), Some(std::path::Path::new("/srv/app/")));
        assert!(!config.exception.enabled);
        assert_eq!(config.exception.module, "bootjs-exception");
        assert_eq!(config.router.urls_prefix, vec!["/admin/", "api"]);
        assert_eq!(config.router.urls_mapping.len(), 2);
        assert!(matches!(
            config.router.urls_mapping.get("/about"),
            Some(MappingEntry::Target(t)) if t == "page/about"
        ));
        match config.router.urls_mapping.get("/post/:id") {
            Some(MappingEntry::Detailed(m)) => {
                assert_eq!(m.param_seq, Some(vec![Some("id".to_string())]));
                assert!(matches!(m.auth, Some(AuthSetting::Flag(true))));
            }
            other => panic!("unexpected mapping {:?}", other),
        }
        let shop = &config.bundles["shop"];
        assert!(shop.pre_load);
        assert_eq!(shop.entry_path.as_deref(), Some("/shop"));
        assert_eq!(shop.extra.get("theme"), Some(&Value::from("dark")));
        assert_eq!(config.services["mailer"].bundle_name.as_deref(), Some("shop"));
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.name, "bootjs");
        assert_eq!(config.env, "prod");
        assert_eq!(config.third_party_bundle.prefixes, vec!["bootjs-bundle-", "", "*"]);
        assert_eq!(config.router.default.controller_name, "index");
        assert!(config.auth.enabled);
        assert!(config.exception.enabled);
    }
}
