//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     router.urlsMapping
//!     → route_item.rs (normalize entries into RouteItem)
//!     → matcher.rs (compile path patterns)
//!     → router.rs (ordered RouteTable, immutable)
//!
//! Incoming Request (method, path)
//!     → router.rs (walk layers in order)
//!     → matcher.rs (match + capture params)
//!     → middleware chain: Next falls through, Done stops, Fail → error handler
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Registration order decides; there is no priority sorting
//! - Unmatched requests get a plain 404

pub mod matcher;
pub mod route_item;
pub mod router;

pub use matcher::PathMatcher;
pub use route_item::{
    normalize_mappings, parse_route_item, AuthSpec, MappingError, RouteItem, RouteMethod,
    RouteSource, UnknownMethod,
};
pub use router::RouteTable;
