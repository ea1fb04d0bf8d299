//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define router metrics (lifecycle events, anomalies, outbound flows)
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `router_events_total` (counter): lifecycle callbacks by event, outcome
//! - `router_anomalies_total` (counter): recorded anomalies by kind
//! - `router_outbound_flow_rate` (gauge): current outbound rate per recipient
//! - `router_active_streams` (gauge): contributors currently routed
//! - `router_http_requests_total` (counter): API requests by route, status
//!
//! # Design Decisions
//! - Recording functions are free functions so the engine stays decoupled
//!   from the exporter
//! - Rates are exported as f64 gauges; precision loss above 2^53 is accepted

use alloy::primitives::Address;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use crate::streaming::types::FlowRate;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_event(event: &'static str, outcome: &'static str) {
    ::metrics::counter!("router_events_total", "event" => event, "outcome" => outcome).increment(1);
}

pub fn record_anomaly(kind: &'static str) {
    ::metrics::counter!("router_anomalies_total", "kind" => kind).increment(1);
}

pub fn record_outbound(recipient: Address, rate: FlowRate) {
    ::metrics::gauge!("router_outbound_flow_rate", "recipient" => recipient.to_string())
        .set(rate.get() as f64);
}

pub fn record_active_streams(count: usize) {
    ::metrics::gauge!("router_active_streams").set(count as f64);
}

pub fn record_request(route: String, status: u16) {
    ::metrics::counter!(
        "router_http_requests_total",
        "route" => route,
        "status" => status.to_string()
    )
    .increment(1);
}
