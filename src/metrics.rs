/// Metrics for credential resolution
///
/// Provides Prometheus-compatible counters for:
/// - In-memory token hits
/// - Persistent store lookups per backend
/// - Network authorization fetches
/// - In-flight fetch sharing and invalidations

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    /// Tokens served straight from resolver memory
    pub static ref CREDENTIAL_MEMORY_HITS_TOTAL: IntCounter = register_int_counter!(
        "credential_memory_hits_total",
        "Total number of tokens served from resolver memory"
    )
    .unwrap();

    /// Persistent store lookups by backend and result (hit, miss, error)
    pub static ref CREDENTIAL_STORE_LOOKUPS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "credential_store_lookups_total",
        "Total number of persistent credential store lookups",
        &["store", "result"]
    )
    .unwrap();

    /// Network authorization handshakes by result
    pub static ref CREDENTIAL_NETWORK_FETCHES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "credential_network_fetches_total",
        "Total number of network authorization handshakes",
        &["result"]
    )
    .unwrap();

    /// Callers that joined a fetch already in flight
    pub static ref CREDENTIAL_FETCH_JOINS_TOTAL: IntCounter = register_int_counter!(
        "credential_fetch_joins_total",
        "Total number of callers that joined an in-flight credential fetch"
    )
    .unwrap();

    /// Explicit invalidations after a rejected token
    pub static ref CREDENTIAL_INVALIDATIONS_TOTAL: IntCounter = register_int_counter!(
        "credential_invalidations_total",
        "Total number of credential invalidations"
    )
    .unwrap();

    /// Write-through failures that were downgraded to warnings
    pub static ref CREDENTIAL_STORAGE_WRITE_FAILURES_TOTAL: IntCounter = register_int_counter!(
        "credential_storage_write_failures_total",
        "Total number of persistent store writes that failed after a successful fetch"
    )
    .unwrap();
}

/// Record a persistent store lookup
pub fn record_store_lookup(store: &str, result: &str) {
    CREDENTIAL_STORE_LOOKUPS_TOTAL
        .with_label_values(&[store, result])
        .inc();
}

/// Record a network handshake outcome
pub fn record_network_fetch(success: bool) {
    let result = if success { "success" } else { "failure" };
    CREDENTIAL_NETWORK_FETCHES_TOTAL
        .with_label_values(&[result])
        .inc();
}

/// Render all registered metrics in Prometheus text format
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
