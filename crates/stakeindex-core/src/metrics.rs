//! Prometheus metrics helpers for the staking indexer.
//!
//! This module provides centralized metrics initialization and the metric
//! definitions used by the ingest pipeline.
//!
//! # Usage
//!
//! ```rust,ignore
//! use stakeindex_core::metrics::{init_metrics, start_metrics_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     // Initialize the Prometheus recorder
//!     let handle = init_metrics();
//!
//!     // Start the HTTP server for /metrics endpoint
//!     start_metrics_server(9090, handle).await.unwrap();
//!
//!     // Now use metrics anywhere in your code
//!     metrics::counter!("indexer_events_total", "kind" => "staked").increment(1);
//! }
//! ```
//!
//! # Metric Naming Conventions
//!
//! - Prefix: component name (`indexer_`, `replay_`, `source_`)
//! - Suffix: unit or type (`_total`, `_seconds`)
//! - Labels: only bounded sets (event kind, drop reason)

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Initialize the Prometheus metrics recorder.
///
/// This must be called once at startup before any metrics are recorded.
/// Returns a handle that can be used with [`start_metrics_server`].
///
/// # Panics
///
/// Panics if called more than once (the recorder can only be installed once).
pub fn init_metrics() -> PrometheusHandle {
    try_init_metrics().expect("Failed to install Prometheus recorder")
}

/// Try to initialize the Prometheus metrics recorder.
///
/// Like [`init_metrics`] but returns `None` if the recorder is already installed,
/// instead of panicking. Useful for tests or optional metrics.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder().ok()?;
    register_indexer_metrics();
    Some(handle)
}

/// Start the Prometheus metrics HTTP server.
///
/// Serves the `/metrics` endpoint on the specified port. The listener is bound
/// before returning, so a port conflict surfaces as an error here; serving
/// then continues on a background task.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "metrics server stopped");
        }
    });

    Ok(())
}

/// Register descriptions for the indexer metrics.
///
/// Called automatically by [`init_metrics`].
fn register_indexer_metrics() {
    // =========================================================================
    // Event Application
    // =========================================================================

    describe_counter!(
        "indexer_events_total",
        "Events delivered to the indexer (label: kind)"
    );
    describe_counter!(
        "indexer_events_applied_total",
        "Events applied to aggregate state (label: kind)"
    );
    describe_counter!(
        "indexer_events_dropped_total",
        "Events skipped without changing aggregates (label: reason)"
    );
    describe_counter!(
        "indexer_apply_errors_total",
        "Fatal errors raised while applying an event"
    );
    describe_histogram!(
        "indexer_apply_seconds",
        "Time spent applying and committing one event"
    );
    describe_gauge!("indexer_last_block", "Block number of the last processed event");

    // =========================================================================
    // Replay Driver
    // =========================================================================

    describe_counter!(
        "indexer_apply_retries_total",
        "Retries of events after a retryable storage failure"
    );
    describe_gauge!(
        "indexer_running",
        "Whether a replay is currently running (1=yes, 0=no)"
    );

    // =========================================================================
    // Event Sources
    // =========================================================================

    describe_counter!("source_lines_total", "Lines read from JSONL event files");
    describe_counter!(
        "source_parse_errors_total",
        "Lines that could not be decoded as events"
    );
    describe_counter!("source_files_total", "Event files opened");
}

// =============================================================================
// Metric Recording Helpers
// =============================================================================

/// Increment a counter.
///
/// Convenience wrapper around `metrics::counter!`.
#[inline]
pub fn increment(name: &'static str, count: u64) {
    metrics::counter!(name).increment(count);
}

/// Increment a counter carrying a single bounded label.
#[inline]
pub fn increment_labeled(
    name: &'static str,
    label: &'static str,
    value: &'static str,
    count: u64,
) {
    metrics::counter!(name, label => value).increment(count);
}

/// Set a gauge value.
///
/// Convenience wrapper around `metrics::gauge!`.
#[inline]
pub fn set_gauge(name: &'static str, value: f64) {
    metrics::gauge!(name).set(value);
}
