//! MVC core: controller contract, module registry and URL resolution.
//!
//! # Data Flow
//! ```text
//! "blog/post/show/42"
//!     → resolver.rs (prefix strip, defaults, nested retry)
//!     → registry.rs (ModuleRoot + "blog/PostController" → ControllerHandle)
//!     → controller.rs (instantiate, call action, await ActionFuture)
//! ```

pub mod controller;
pub mod naming;
pub mod registry;
pub mod resolver;

pub use controller::{
    ActionArgs, ActionContext, ActionFuture, ActionOutput, Controller, FnController, ViewModel,
};
pub use registry::{
    BundleExport, BundleModule, BundleModuleKey, BundleObject, BundleRegistration,
    ControllerHandle, ControllerRegistration, ControllerSource, ModelHandle, ModelRegistration,
    ModuleRoot, Registry, RouteRegistration, ServiceObject,
};
pub use resolver::{split_url, Resolution, UrlSplit};
