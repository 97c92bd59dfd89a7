//! Prometheus metrics for ledger calls
//!
//! Labels carry the operation kind and outcome only, never request content.

use metrics::{counter, gauge, histogram};
use std::time::Duration;

pub const OP_CALL: &str = "call";
pub const OP_BATCH: &str = "batch";
pub const OP_WRITE: &str = "write";

pub const OUTCOME_OK: &str = "ok";
pub const OUTCOME_TRANSIENT: &str = "transient";
pub const OUTCOME_PERMANENT: &str = "permanent";

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("ledger_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_remote_call(operation: &str, outcome: &str, duration: Duration) {
    counter!("ledger_remote_calls_total", "operation" => operation.to_string(), "outcome" => outcome.to_string()).increment(1);
    histogram!("ledger_remote_call_duration_seconds", "operation" => operation.to_string())
        .record(duration.as_secs_f64());
}

pub fn record_retry(operation: &str) {
    counter!("ledger_retries_total", "operation" => operation.to_string()).increment(1);
}

pub fn record_exhausted(operation: &str) {
    counter!("ledger_retries_exhausted_total", "operation" => operation.to_string()).increment(1);
}

pub fn record_batch_size(size: usize) {
    histogram!("ledger_batch_size").record(size as f64);
}

pub fn set_in_flight(in_flight: usize) {
    gauge!("ledger_calls_in_flight").set(in_flight as f64);
}
