//! Convention-based MVC routing for axum hosts.
//!
//! URLs resolve to `<Name>Controller.<action>()` entries in a module
//! registry, falling back to lazily loaded bundles (sub-applications with
//! their own controllers, models, views and configuration).

pub mod app;
pub mod auth;
pub mod bundle;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod mvc;
pub mod observability;
pub mod routing;
pub mod view;

#[doc(hidden)]
pub use inventory;

pub use app::{App, AppBuilder, StartupError};
pub use config::AppConfig;
pub use error::{ModuleError, RouteError};
pub use http::{ApiResponse, Exchange, HttpServer};
pub use lifecycle::Shutdown;
