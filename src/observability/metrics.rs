//! Metrics collection and exposition.

use std::net::SocketAddr;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::time::Instant;
use metrics::{counter, histogram, gauge};

/// Initialize metrics exporter and server.
pub fn init_metrics(addr: SocketAddr) {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus recorder");
        
    tracing::info!("Metrics server listening on http://{}", addr);
}

/// Helper to record a proxy request.
pub fn record_request(method: &str, status: u16, backend: &str, duration: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("backend", backend.to_string()),
    ];
    
    counter!("proxy_requests_total", &labels).increment(1);
    histogram!("proxy_request_duration_seconds", &labels).record(duration.elapsed().as_secs_f64());
}

/// Helper to update backend health status for metrics.
pub fn record_backend_health(backend: &str, healthy: bool) {
    let val = if healthy { 1.0 } else { 0.0 };
    gauge!("proxy_backend_healthy", "backend" => backend.to_string()).set(val);
}

/// Rate-limit admission outcome (C2).
pub fn record_rate_limit(algorithm: &str, allowed: bool, bypassed: bool) {
    let outcome = if bypassed { "bypassed" } else if allowed { "allowed" } else { "denied" };
    counter!("proxy_rate_limit_decisions_total", "algorithm" => algorithm.to_string(), "outcome" => outcome).increment(1);
}

/// Circuit breaker state transition (C6).
pub fn record_breaker_state(backend: &str, state: &str) {
    gauge!("proxy_breaker_state", "backend" => backend.to_string(), "state" => state.to_string()).set(1.0);
}

/// A single proxy-executor retry attempt (C9).
pub fn record_retry(backend: &str) {
    counter!("proxy_retries_total", "backend" => backend.to_string()).increment(1);
}

/// A long-lived (WebSocket) connection opening or closing; `delta` is +1/-1.
pub fn record_long_lived_connection(kind: &str, delta: i64) {
    gauge!("proxy_long_lived_connections", "kind" => kind.to_string()).increment(delta as f64);
}
