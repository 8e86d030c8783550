//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → App::builder (normalize, preload bundles) → route table → listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → server stops accepting → in-flight requests drain
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
