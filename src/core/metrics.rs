// src/core/metrics.rs

//! Defines and registers Prometheus metrics for server monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, TextEncoder, register_counter, register_gauge};

lazy_static! {
    // --- Server-wide Gauges ---
    /// The number of clients currently connected to the server.
    pub static ref CONNECTED_CLIENTS: Gauge =
        register_gauge!("linewire_connected_clients", "Number of currently connected clients.").unwrap();
    /// Whether the single-client admission slot is occupied (1 for true, 0 for false).
    pub static ref ADMISSION_SLOT_OCCUPIED: Gauge =
        register_gauge!("linewire_admission_slot_occupied", "Single-client admission slot occupied (1 for true, 0 for false).").unwrap();

    // --- Server-wide Counters ---
    /// The total number of connections accepted by the listener since startup.
    pub static ref CONNECTIONS_RECEIVED_TOTAL: Counter =
        register_counter!("linewire_connections_received_total", "Total number of connections received.").unwrap();
    /// The total number of connections turned away by the admission controller.
    pub static ref CONNECTIONS_REJECTED_TOTAL: Counter =
        register_counter!("linewire_connections_rejected_total", "Total number of connections rejected by admission control.").unwrap();
    /// The total number of messages matched to a handler.
    pub static ref COMMANDS_PROCESSED_TOTAL: Counter =
        register_counter!("linewire_commands_processed_total", "Total number of commands processed.").unwrap();
    /// The total number of messages that matched no registration.
    pub static ref UNKNOWN_COMMANDS_TOTAL: Counter =
        register_counter!("linewire_unknown_commands_total", "Total number of unknown commands or arity mismatches.").unwrap();
    /// The total number of handler invocations that reported an error or panicked.
    pub static ref HANDLER_ERRORS_TOTAL: Counter =
        register_counter!("linewire_handler_errors_total", "Total number of handler failures, including invalid arguments.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_else(|e| format!("# failed to encode metrics: {e}\n"))
}
