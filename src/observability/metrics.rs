//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mvc_requests_total` (counter): dispatched requests by method, status, bundle
//! - `mvc_request_duration_seconds` (histogram): dispatch latency
//! - `mvc_bundle_loads_total` (counter): bundle load attempts by outcome

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener on `addr`.
/// Must run inside the tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one dispatched request. `bundle` is empty for the application tree.
pub fn record_dispatch(method: &str, status: u16, bundle: &str, started: Instant) {
    let bundle = if bundle.is_empty() { "app" } else { bundle };
    counter!(
        "mvc_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "bundle" => bundle.to_string()
    )
    .increment(1);
    histogram!("mvc_request_duration_seconds", "method" => method.to_string())
        .record(started.elapsed().as_secs_f64());
}

/// Record a bundle load attempt: `loaded`, `not_found` or `broken`.
pub fn record_bundle_load(name: &str, outcome: &'static str) {
    counter!("mvc_bundle_loads_total", "bundle" => name.to_string(), "outcome" => outcome).increment(1);
}
