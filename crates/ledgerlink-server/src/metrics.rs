//! Prometheus metrics for the HTTP surface
//!
//! Labels carry the route and outcome only, never ids.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

use crate::error::{Result, ServerError};

pub const ROUTE_ENTITY: &str = "entity";
pub const ROUTE_BATCH: &str = "batch";
pub const ROUTE_RECENT: &str = "recent";

pub const OUTCOME_FOUND: &str = "found";
pub const OUTCOME_NOT_FOUND: &str = "not_found";
pub const OUTCOME_CLIENT_ERROR: &str = "client_error";
pub const OUTCOME_UPSTREAM_ERROR: &str = "upstream_error";
pub const OUTCOME_SERVER_ERROR: &str = "server_error";

pub fn record_http_request(route: &str, outcome: &str, duration: Duration) {
    counter!("ledgerlink_http_requests_total", "route" => route.to_string(), "outcome" => outcome.to_string()).increment(1);
    histogram!("ledgerlink_http_request_duration_seconds", "route" => route.to_string(), "outcome" => outcome.to_string())
        .record(duration.as_secs_f64());
}

pub fn record_batch_items(found: usize, not_found: usize, errors: usize) {
    counter!("ledgerlink_batch_items_total", "outcome" => OUTCOME_FOUND).increment(found as u64);
    counter!("ledgerlink_batch_items_total", "outcome" => OUTCOME_NOT_FOUND).increment(not_found as u64);
    counter!("ledgerlink_batch_items_total", "outcome" => OUTCOME_UPSTREAM_ERROR).increment(errors as u64);
}

/// Install the global Prometheus recorder; fails if one is already installed
pub fn init_prometheus_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Internal(format!("Failed to install Prometheus recorder: {}", e)))
}
