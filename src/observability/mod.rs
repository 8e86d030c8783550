//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured logs, request ID in spans)
//!     → metrics.rs (dispatch and bundle load counters, latency histogram)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, human or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level
//! - Metrics are cheap when no recorder is installed

pub mod logging;
pub mod metrics;
