//! Service factory and per-request memoization.

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value};

use crate::app::App;
use crate::config::AppConfig;
use crate::error::{ModuleError, RouteError};
use crate::http::Exchange;
use crate::mvc::registry::{ModuleRoot, ServiceObject};

/// Caller-side options for `get_service`. A `services.<name>` entry in the
/// configuration takes precedence over these.
#[derive(Debug, Clone, Default)]
pub struct ServiceOptions {
    pub bundle_name: Option<String>,
    pub module_name: Option<String>,
    pub params: Option<Map<String, Value>>,
    pub reload: bool,
}

impl ServiceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bundle(mut self, name: impl Into<String>) -> Self {
        self.bundle_name = Some(name.into());
        self
    }

    pub fn module(mut self, name: impl Into<String>) -> Self {
        self.module_name = Some(name.into());
        self
    }

    pub fn params(mut self, params: Map<String, Value>) -> Self {
        self.params = Some(params);
        self
    }

    pub fn reload(mut self) -> Self {
        self.reload = true;
        self
    }
}

/// Handed to a model factory when a service is created.
#[derive(Clone)]
pub struct ServiceInit {
    pub name: String,
    pub params: Map<String, Value>,
    pub app: App,
    /// Set when the service is created inside a request.
    pub exchange: Option<Exchange>,
}

impl ServiceInit {
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn app_value<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.app.app_context::<T>(name)
    }
}

/// A service request after configuration overrides.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ServiceRequest {
    pub service_name: String,
    pub bundle_name: String,
    pub module_name: Option<String>,
    pub params: Map<String, Value>,
    pub reload: bool,
}

impl ServiceRequest {
    pub fn resolve(config: &AppConfig, name: &str, opts: ServiceOptions) -> Self {
        match config.services.get(name) {
            Some(conf) => Self {
                service_name: conf.service_name.clone().unwrap_or_else(|| name.to_string()),
                bundle_name: conf
                    .bundle_name
                    .clone()
                    .or(opts.bundle_name)
                    .unwrap_or_default(),
                module_name: conf.module_name.clone(),
                params: conf.params.clone().or(opts.params).unwrap_or_default(),
                reload: conf.reload || opts.reload,
            },
            None => Self {
                service_name: name.to_string(),
                bundle_name: opts.bundle_name.unwrap_or_default(),
                module_name: opts.module_name,
                params: opts.params.unwrap_or_default(),
                reload: opts.reload,
            },
        }
    }

    /// Memo key: owning bundle (or module) followed by the service name.
    pub fn memo_key(&self) -> String {
        let owner = if self.bundle_name.is_empty() {
            self.module_name.as_deref().unwrap_or_default()
        } else {
            self.bundle_name.as_str()
        };
        format!("{}{}", owner, self.service_name)
    }

    /// Model to instantiate: the module override, else the service name.
    pub fn model_name(&self) -> &str {
        self.module_name.as_deref().unwrap_or(&self.service_name)
    }

    pub fn create(&self, app: &App, exchange: Option<Exchange>) -> Result<ServiceObject, RouteError> {
        let root = ModuleRoot::for_bundle(&self.bundle_name);
        let handle = app.registry().model(&root, self.model_name()).map_err(|err| match err {
            ModuleError::NotFound(_) => RouteError::ServiceNotFound {
                name: self.model_name().to_string(),
            },
            broken => RouteError::Module(broken),
        })?;
        let init = ServiceInit {
            name: self.service_name.clone(),
            params: self.params.clone(),
            app: app.clone(),
            exchange,
        };
        Ok(handle.create(init)?)
    }
}

/// Services memoized for one request.
pub(crate) type ServiceMemo = Arc<DashMap<String, ServiceObject>>;

pub(crate) fn memoized_service<T: Any + Send + Sync>(
    app: &App,
    exchange: &Exchange,
    memo: &ServiceMemo,
    name: &str,
    opts: ServiceOptions,
) -> Result<Arc<T>, RouteError> {
    let request = ServiceRequest::resolve(app.config(), name, opts);
    let key = request.memo_key();

    let cached = if request.reload {
        None
    } else {
        memo.get(&key).map(|entry| entry.value().clone())
    };
    let service = match cached {
        Some(service) => service,
        None => {
            let service = request.create(app, Some(exchange.clone()))?;
            memo.insert(key, service.clone());
            service
        }
    };
    downcast(service, &request.service_name)
}

pub(crate) fn downcast<T: Any + Send + Sync>(service: ServiceObject, name: &str) -> Result<Arc<T>, RouteError> {
    service
        .downcast::<T>()
        .map_err(|_| RouteError::ServiceType { name: name.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use serde_json::json;

    #[test]
    fn test_config_overrides_options() {
        let mut config = AppConfig::default();
        config.services.insert(
            "users".into(),
            ServiceConfig {
                service_name: Some("UserService".into()),
                bundle_name: Some("account".into()),
                params: Some(json!({"limit": 5}).as_object().unwrap().clone()),
                ..Default::default()
            },
        );

        let req = ServiceRequest::resolve(&config, "users", ServiceOptions::new().bundle("shop").reload());
        assert_eq!(req.service_name, "UserService");
        assert_eq!(req.bundle_name, "account");
        assert_eq!(req.params["limit"], 5);
        assert!(req.reload);
        assert_eq!(req.memo_key(), "accountUserService");
    }

    #[test]
    fn test_options_without_config() {
        let req = ServiceRequest::resolve(
            &AppConfig::default(),
            "Cart",
            ServiceOptions::new().module("cart-lib"),
        );
        assert_eq!(req.memo_key(), "cart-libCart");
        assert_eq!(req.model_name(), "cart-lib");
        assert!(req.params.is_empty());
    }
}
