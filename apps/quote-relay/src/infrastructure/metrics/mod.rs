//! Prometheus Metrics Module
//!
//! Exposes relay metrics in Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Ingestion**: frames received, quotes relayed, decode failures
//! - **Connection**: reconnect attempts
//! - **Delivery**: queued fan-out counts, drops from stalled sinks,
//!   attached sink gauge
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

fn register_metrics() {
    describe_counter!(
        "quote_relay_frames_received_total",
        "Total text frames received from the upstream stream"
    );
    describe_counter!(
        "quote_relay_quotes_relayed_total",
        "Total quote events queued for delivery, summed over sinks"
    );
    describe_counter!(
        "quote_relay_quotes_dropped_total",
        "Total quote events dropped because a sink queue was full"
    );
    describe_counter!(
        "quote_relay_decode_errors_total",
        "Total upstream frames dropped as undecodable"
    );
    describe_counter!(
        "quote_relay_reconnects_total",
        "Total upstream reconnection attempts"
    );
    describe_gauge!(
        "quote_relay_attached_sinks",
        "Number of currently attached subscriber sinks"
    );
}

/// Record one text frame received from the upstream.
pub fn record_frame_received() {
    counter!("quote_relay_frames_received_total").increment(1);
}

/// Record quote events queued for delivery across sinks.
pub fn record_quotes_relayed(count: usize) {
    counter!("quote_relay_quotes_relayed_total").increment(count as u64);
}

/// Record a quote dropped because a sink queue was full.
pub fn record_quote_dropped() {
    counter!("quote_relay_quotes_dropped_total").increment(1);
}

/// Record an upstream frame dropped as undecodable.
pub fn record_decode_error() {
    counter!("quote_relay_decode_errors_total").increment(1);
}

/// Record an upstream reconnection attempt.
pub fn record_reconnect() {
    counter!("quote_relay_reconnects_total").increment(1);
}

/// Update the attached sink gauge.
pub fn set_attached_sinks(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("quote_relay_attached_sinks").set(count as f64);
}
