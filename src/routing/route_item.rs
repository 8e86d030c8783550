//! Canonical route items and their construction from `router.urlsMapping`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::http::Method;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::schema::{AuthConfig, AuthSetting, MappingEntry, RouterConfig};
use crate::http::middleware::Middleware;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown route method '{0}'")]
pub struct UnknownMethod(pub String);

/// HTTP method a route answers to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RouteMethod {
    #[default]
    All,
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl RouteMethod {
    pub fn matches(&self, method: &Method) -> bool {
        match self {
            RouteMethod::All => true,
            RouteMethod::Get => method == Method::GET || method == Method::HEAD,
            RouteMethod::Post => method == Method::POST,
            RouteMethod::Put => method == Method::PUT,
            RouteMethod::Delete => method == Method::DELETE,
            RouteMethod::Patch => method == Method::PATCH,
            RouteMethod::Head => method == Method::HEAD,
            RouteMethod::Options => method == Method::OPTIONS,
        }
    }
}

impl FromStr for RouteMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(RouteMethod::All),
            "get" => Ok(RouteMethod::Get),
            "post" => Ok(RouteMethod::Post),
            "put" => Ok(RouteMethod::Put),
            "delete" => Ok(RouteMethod::Delete),
            "patch" => Ok(RouteMethod::Patch),
            "head" => Ok(RouteMethod::Head),
            "options" => Ok(RouteMethod::Options),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

/// Path pattern or regular expression a route matches against.
#[derive(Debug, Clone)]
pub enum RouteSource {
    Path(String),
    Regex(Regex),
}

impl RouteSource {
    pub fn as_str(&self) -> &str {
        match self {
            RouteSource::Path(p) => p,
            RouteSource::Regex(r) => r.as_str(),
        }
    }
}

impl fmt::Display for RouteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Auth settings of a single route.
#[derive(Clone, Default)]
pub struct AuthSpec {
    pub enabled: bool,
    /// Auth provider the gate consults.
    pub module: String,
    /// Answer with an API error (or `ajax_failure_url`) instead of a page
    /// redirect.
    pub ajax: bool,
    pub ajax_failure_url: Option<String>,
    pub web_failure_url: Option<String>,
    /// Replaces the default gate.
    pub middleware: Option<Arc<dyn Middleware>>,
}

impl AuthSpec {
    pub fn disabled(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            ..Default::default()
        }
    }

    pub fn required(module: impl Into<String>) -> Self {
        Self {
            enabled: true,
            module: module.into(),
            ..Default::default()
        }
    }
}

impl fmt::Debug for AuthSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSpec")
            .field("enabled", &self.enabled)
            .field("module", &self.module)
            .field("ajax", &self.ajax)
            .field("custom_middleware", &self.middleware.is_some())
            .finish()
    }
}

/// One route. Immutable once built.
#[derive(Clone)]
pub struct RouteItem {
    pub source: RouteSource,
    /// URL handed to dispatch; may hold `${param}` placeholders.
    pub target: String,
    pub method: RouteMethod,
    pub param_seq: Option<Vec<Option<String>>>,
    pub auth: AuthSpec,
    /// Initial controller parameters.
    pub params: Map<String, Value>,
    /// The catch-all route dispatching the live request URL.
    pub is_auto: bool,
    pub middlewares: Vec<Arc<dyn Middleware>>,
}

impl RouteItem {
    /// Route on a path pattern; the target defaults to the pattern.
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            target: source.clone(),
            source: RouteSource::Path(source),
            method: RouteMethod::All,
            param_seq: None,
            auth: AuthSpec::default(),
            params: Map::new(),
            is_auto: false,
            middlewares: Vec::new(),
        }
    }

    pub fn regex(source: Regex) -> Self {
        let mut item = Self::new(source.as_str());
        item.source = RouteSource::Regex(source);
        item
    }

    /// `/*` dispatching whatever URL it receives.
    pub fn auto() -> Self {
        let mut item = Self::new("/*");
        item.is_auto = true;
        item
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn method(mut self, method: RouteMethod) -> Self {
        self.method = method;
        self
    }

    pub fn param_seq<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.param_seq = Some(names.into_iter().map(|n| Some(n.into())).collect());
        self
    }

    pub fn params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    pub fn auth(mut self, auth: AuthSpec) -> Self {
        self.auth = auth;
        self
    }

    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }
}

impl fmt::Debug for RouteItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteItem")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("method", &self.method)
            .field("param_seq", &self.param_seq)
            .field("auth", &self.auth)
            .field("is_auto", &self.is_auto)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("route '{route}': {source}")]
    Method {
        route: String,
        #[source]
        source: UnknownMethod,
    },

    #[error("route '{route}': {source}")]
    Regex {
        route: String,
        #[source]
        source: regex::Error,
    },

    #[error("route pattern '{route}' does not compile: {source}")]
    Pattern {
        route: String,
        #[source]
        source: regex::Error,
    },
}

/// Normalize one `urlsMapping` entry. A bare string is the target; the
/// source defaults to the mapping key.
pub fn parse_route_item(key: &str, entry: &MappingEntry, auth: &AuthConfig) -> Result<RouteItem, MappingError> {
    let mapping = match entry {
        MappingEntry::Target(target) => {
            return Ok(RouteItem::new(key).target(target.clone()).auth(AuthSpec::disabled(&auth.module)));
        }
        MappingEntry::Detailed(mapping) => mapping,
    };

    let source = mapping.source.clone().unwrap_or_else(|| key.to_string());
    let mut item = if mapping.kind.as_deref() == Some("regexp") {
        let regex = Regex::new(&source).map_err(|source| MappingError::Regex {
            route: key.to_string(),
            source,
        })?;
        RouteItem::regex(regex)
    } else {
        RouteItem::new(source)
    };

    if let Some(target) = &mapping.target {
        item.target = target.clone();
    }
    if let Some(method) = &mapping.method {
        item.method = method.parse().map_err(|source| MappingError::Method {
            route: key.to_string(),
            source,
        })?;
    }
    item.param_seq = mapping.param_seq.clone();
    item.params = mapping.params.clone();
    item.auth = match &mapping.auth {
        None | Some(AuthSetting::Flag(false)) => AuthSpec::disabled(&auth.module),
        Some(AuthSetting::Flag(true)) => AuthSpec::required(&auth.module),
        Some(AuthSetting::Detailed(conf)) => AuthSpec {
            enabled: conf.enabled,
            module: conf.module.clone().unwrap_or_else(|| auth.module.clone()),
            ajax: conf.ajax,
            ajax_failure_url: conf.ajax_failure_url.clone(),
            web_failure_url: conf.web_failure_url.clone(),
            middleware: None,
        },
    };
    Ok(item)
}

/// Every configured mapping, in declaration order.
pub fn normalize_mappings(router: &RouterConfig, auth: &AuthConfig) -> Result<Vec<RouteItem>, MappingError> {
    router
        .urls_mapping
        .iter()
        .map(|(key, entry)| parse_route_item(key, entry, auth))
        .collect()
}
