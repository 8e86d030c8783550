//! Per-request context: model and view loaders, memoized services and the
//! bundle-scoped helpers controllers use.

pub mod request;
pub mod scope;
pub mod service;

pub use request::RequestContext;
pub use scope::{BundleScope, BUNDLE_LOCAL, VIEW_PATH_LOCAL};
pub use service::{ServiceInit, ServiceOptions};
