//! Metrics collection and exposition.
//!
//! # Metrics
//! - `balancer_requests_total` (counter): exchanges that reached a backend, by backend
//! - `balancer_relay_aborted_total` (counter): client → backend leg failures, by backend
//! - `balancer_unavailable_total` (counter): synthesized 503 replies, by reason
//! - `balancer_backend_healthy` (gauge): 1=healthy, 0=unhealthy
//!
//! Recording is a no-op until `init_metrics` installs the exporter.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_forwarded(backend: &str) {
    counter!("balancer_requests_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_aborted(backend: &str) {
    counter!("balancer_relay_aborted_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_unavailable(reason: &'static str) {
    counter!("balancer_unavailable_total", "reason" => reason).increment(1);
}

pub fn record_backend_health(backend: &str, healthy: bool) {
    gauge!("balancer_backend_healthy", "backend" => backend.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}
