//! Dispatch: binds resolved routes into the route table and runs actions.
//!
//! # Data Flow
//! ```text
//! RouteTable match
//!     → [AuthGate] → [route middlewares] → TerminalHandler
//!     → Dispatcher::load_mvc
//!         → Resolution::load_controller (app tree, nested retry)
//!         → bundle fallback over thirdPartyBundle.prefixes
//!         → parameter binding
//!         → call_action → ApiResponse JSON | HTML view | Next → later routes
//!                         | Err → error handler
//! ```

pub mod dispatcher;
pub mod routes;

pub use dispatcher::{Dispatched, Dispatcher, Target};
pub use routes::Routes;
