//! Metrics collection and exposition.
//!
//! # Metrics
//! - `interceptor_requests_total` (counter): requests answered, by method and status
//! - `interceptor_request_duration_seconds` (histogram): end-to-end latency
//! - `interceptor_queue_depth` (gauge): requests waiting in the replay queue
//! - `interceptor_ledger_entries` (gauge): ledger entries by state
//! - `interceptor_unavailable` (gauge): 1 while any availability flag is set
//! - `interceptor_snapshot_attempts_total` (counter): attempts by outcome
//! - `interceptor_replayed_requests_total` (counter): restore replays by outcome

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::availability::AvailabilityFlags;
use crate::ledger::LedgerStats;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    ::metrics::counter!(
        "interceptor_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("interceptor_request_duration_seconds")
        .record(start.elapsed().as_secs_f64());
}

pub fn record_queue_depth(depth: usize) {
    ::metrics::gauge!("interceptor_queue_depth").set(depth as f64);
}

pub fn record_ledger_stats(stats: &LedgerStats) {
    ::metrics::gauge!("interceptor_ledger_entries", "state" => "pending").set(stats.pending as f64);
    ::metrics::gauge!("interceptor_ledger_entries", "state" => "processed").set(stats.processed as f64);
    ::metrics::gauge!("interceptor_ledger_entries", "state" => "snapshoted").set(stats.snapshoted as f64);
}

pub fn record_availability(flags: &AvailabilityFlags) {
    ::metrics::gauge!("interceptor_unavailable").set(if flags.unavailable { 1.0 } else { 0.0 });
}

pub fn record_snapshot_attempt(outcome: &'static str) {
    ::metrics::counter!("interceptor_snapshot_attempts_total", "outcome" => outcome).increment(1);
}

pub fn record_replay(outcome: &'static str, count: usize) {
    ::metrics::counter!("interceptor_replayed_requests_total", "outcome" => outcome)
        .increment(count as u64);
}
