//! Prometheus metrics for the mirror
//!
//! Counters for both update paths. The webhook server exposes them at
//! `/metrics`; the bulk sync only logs them.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, CounterVec, Encoder,
    HistogramVec, IntCounter, TextEncoder,
};

lazy_static! {
    /// Documents written to the store, by collection
    pub static ref DOCUMENTS_STORED: CounterVec = register_counter_vec!(
        "ghmirror_documents_stored_total",
        "Documents upserted into the mirror",
        &["collection"]
    )
    .expect("Failed to create documents_stored metric");

    /// Documents dropped because no canonical key could be derived
    pub static ref UNRESOLVED_DOCUMENTS: CounterVec = register_counter_vec!(
        "ghmirror_unresolved_documents_total",
        "Documents that could not be persisted because their identity was unresolvable",
        &["source"]
    )
    .expect("Failed to create unresolved_documents metric");

    /// Times the rate governor suspended a fetch loop
    pub static ref RATE_LIMIT_WAITS: IntCounter = register_int_counter!(
        "ghmirror_rate_limit_waits_total",
        "Number of times a fetch loop waited for the rate window to reset"
    )
    .expect("Failed to create rate_limit_waits metric");

    /// Discarded draft releases removed from the store
    pub static ref DRAFTS_REMOVED: IntCounter = register_int_counter!(
        "ghmirror_drafts_removed_total",
        "Draft releases removed because they no longer exist upstream"
    )
    .expect("Failed to create drafts_removed metric");

    /// Webhook deliveries by terminal state
    pub static ref WEBHOOK_DELIVERIES: CounterVec = register_counter_vec!(
        "ghmirror_webhook_deliveries_total",
        "Webhook deliveries by outcome",
        &["event", "outcome"]
    )
    .expect("Failed to create webhook_deliveries metric");

    /// Duration of one sync step for one repository
    pub static ref STEP_DURATION: HistogramVec = register_histogram_vec!(
        "ghmirror_sync_step_duration_seconds",
        "Duration of a single resource sync step",
        &["resource"],
        vec![1.0, 5.0, 30.0, 60.0, 300.0, 900.0, 3600.0]
    )
    .expect("Failed to create sync_step_duration metric");
}

pub fn record_document_stored(collection: &str) {
    DOCUMENTS_STORED.with_label_values(&[collection]).inc();
}

pub fn record_unresolved(source: &str) {
    UNRESOLVED_DOCUMENTS.with_label_values(&[source]).inc();
}

pub fn record_rate_limit_wait() {
    RATE_LIMIT_WAITS.inc();
}

pub fn record_draft_removed() {
    DRAFTS_REMOVED.inc();
}

pub fn record_delivery(event: &str, outcome: &str) {
    WEBHOOK_DELIVERIES.with_label_values(&[event, outcome]).inc();
}

pub fn record_step_duration(resource: &str, duration_secs: f64) {
    STEP_DURATION
        .with_label_values(&[resource])
        .observe(duration_secs);
}

/// Encode all metrics as Prometheus text format
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
