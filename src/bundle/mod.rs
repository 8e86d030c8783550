//! Bundles: independently loadable sub-applications with their own
//! controllers, models, views and configuration.
//!
//! # Data Flow
//! ```text
//! startup: config bundles + bundles/ dir scan → BundleRegistry (Pending)
//! request: first segment → candidate names (registry + segment, not stored)
//!     → loader.rs: registry module lookup (prefix + name, or in-tree)
//!     → bundle config tree (ConfigSource) + declared overrides
//!     → `core` fragments merged into the host config tree
//!     → BundleRegistry (Loaded, at most once per name)
//! ```

pub mod descriptor;
pub mod loader;
pub mod registry;

use thiserror::Error;

use crate::config::ConfigError;
use crate::error::ModuleError;

pub use descriptor::{BundleDefaults, BundleDescriptor};
pub use loader::BundleLoader;
pub use registry::{BundleEntry, BundleRegistry};

#[derive(Debug, Error)]
pub enum BundleError {
    /// An in-tree bundle was requested but no source directory is known.
    #[error("bundle '{0}' has no base directory")]
    NoBaseDir(String),

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error("bundle config: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid bundle descriptor: {0}")]
    Descriptor(#[source] serde_json::Error),
}

impl BundleError {
    /// The bundle module exists but failed to load.
    pub fn is_broken(&self) -> bool {
        match self {
            BundleError::Module(e) => e.is_broken(),
            _ => false,
        }
    }
}
