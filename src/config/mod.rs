//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → normalize.rs (baseDir defaults, prefix cleanup, bundle discovery)
//!     → AppConfig (immutable, shared via App)
//!
//! On bundle load:
//!     loader.rs ConfigSource reads the bundle config tree
//!     → merge.rs folds `core` fragments into the host config tree
//! ```
//!
//! # Design Decisions
//! - AppConfig is immutable once normalized
//! - The free-form host config tree is the only mutable part (bundle merges)
//! - All fields have defaults to allow minimal configs

pub mod loader;
pub mod merge;
pub mod normalize;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError, ConfigSource, TomlDirSource};
pub use schema::{
    AppConfig, AuthConfig, AuthSetting, BundleConfig, ListenerConfig, MappingConfig, MappingEntry,
    ObservabilityConfig, RouteDefaults, RouterConfig, ServiceConfig,
};
