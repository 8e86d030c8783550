//! Error types for request resolution and dispatch.
//!
//! Resolution failures travel as values through the fallback chain so the
//! dispatcher can try the next bundle prefix. Only broken modules and final
//! failures surface to the host error pipeline.

use axum::http::StatusCode;
use thiserror::Error;

use crate::bundle::BundleError;
use crate::view::ViewError;

/// Boxed error returned by actions and collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of looking a module up in the registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModuleError {
    /// Nothing is registered under this key.
    #[error("cannot find module '{0}'")]
    NotFound(String),

    /// The module exists but fails while being constructed.
    #[error("module '{module}' failed to load: {reason}")]
    Broken { module: String, reason: String },
}

impl ModuleError {
    /// True for load-time defects, as opposed to absent modules.
    pub fn is_broken(&self) -> bool {
        matches!(self, ModuleError::Broken { .. })
    }
}

/// Dispatch error taxonomy.
#[derive(Debug, Error)]
pub enum RouteError {
    /// Controller or model lookup failure (absent or broken).
    #[error(transparent)]
    Module(#[from] ModuleError),

    /// Underscore-prefixed actions are never routable.
    #[error("{action} is not valid action method.")]
    InvalidAction { action: String },

    #[error("[404 Exception] Action method {controller}Controller.{action}() is not found.")]
    ActionNotFound { controller: String, action: String },

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    View(#[from] ViewError),

    #[error("{name} is not found.")]
    ServiceNotFound { name: String },

    #[error("service {name} does not have the requested type")]
    ServiceType { name: String },

    /// An action resolved to an error.
    #[error("action failed: {0}")]
    Action(#[source] BoxError),
}

impl RouteError {
    /// Wrap an arbitrary action failure.
    pub fn action(err: impl Into<BoxError>) -> Self {
        RouteError::Action(err.into())
    }

    /// True when the failure comes from a module that exists but is broken.
    pub fn is_compile(&self) -> bool {
        match self {
            RouteError::Module(e) => e.is_broken(),
            RouteError::Bundle(BundleError::Module(e)) => e.is_broken(),
            _ => false,
        }
    }

    /// HTTP status this error maps to when nothing more specific was set.
    pub fn status(&self) -> StatusCode {
        match self {
            RouteError::Module(ModuleError::NotFound(_))
            | RouteError::InvalidAction { .. }
            | RouteError::ActionNotFound { .. } => StatusCode::NOT_FOUND,
            RouteError::Bundle(e) if !e.is_broken() => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_errors_map_to_500() {
        let err = RouteError::from(ModuleError::Broken {
            module: "BlogController".into(),
            reason: "bad template".into(),
        });
        assert!(err.is_compile());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = RouteError::from(ModuleError::NotFound("BlogController".into()));
        assert!(!err.is_compile());
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_action_messages() {
        let err = RouteError::ActionNotFound {
            controller: "Blog".into(),
            action: "show".into(),
        };
        assert_eq!(
            err.to_string(),
            "[404 Exception] Action method BlogController.show() is not found."
        );
        let err = RouteError::InvalidAction { action: "_secret".into() };
        assert_eq!(err.to_string(), "_secret is not valid action method.");
    }
}
