//! Structured logging.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(config: &ObservabilityConfig) -> String {
    format!("mvc_router={level},tower_http={level}", level = config.log_level)
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(config)));

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    }
}
