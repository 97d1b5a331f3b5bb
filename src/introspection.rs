//! Introspection endpoints (§6): liveness, readiness, and a status summary.
//!
//! Unauthenticated and mounted on the main listener, per the conventional
//! k8s-probe shape — these exist so an orchestrator can route traffic and
//! restart the process without reaching through the admin surface.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::http::server::GatewayState;

/// Always 200 once the process is running (§6: "liveness ... always 200").
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Serialize)]
struct ReadinessBody {
    ready: bool,
    backends_configured: usize,
    coordination_reachable: bool,
}

/// Ready iff at least one backend is configured and the coordination store
/// answers a ping (§6).
pub async fn readiness(State(state): State<GatewayState>) -> impl IntoResponse {
    let snapshot = state.snapshot.load();
    let backends_configured = snapshot.backends.len();
    let coordination_reachable = state.rate_limit_engine.ping().await.is_ok();
    let ready = backends_configured > 0 && coordination_reachable;

    let body = ReadinessBody { ready, backends_configured, coordination_reachable };
    let status = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(body))
}

#[derive(Serialize)]
struct BackendSummary {
    name: String,
    health: String,
    breaker: String,
    active_connections: usize,
}

#[derive(Serialize)]
struct StatusBody {
    version: &'static str,
    routes: usize,
    backends: Vec<BackendSummary>,
    rate_limit: RateLimitSummary,
}

#[derive(Serialize)]
struct RateLimitSummary {
    total_checks: u64,
    allowed: u64,
    denied: u64,
    coordination_failures: u64,
}

/// Point-in-time summary of routing, backend health/breaker state, and
/// rate-limit counters, for operator dashboards (§6).
pub async fn status(State(state): State<GatewayState>) -> impl IntoResponse {
    use std::sync::atomic::Ordering;

    let snapshot = state.snapshot.load();
    let breaker_states: std::collections::HashMap<_, _> = state.breakers.snapshot().into_iter().collect();

    let backends = snapshot
        .backends
        .all_backends()
        .into_iter()
        .map(|b| BackendSummary {
            breaker: breaker_states
                .get(&b.name)
                .map(|s| format!("{s:?}").to_lowercase())
                .unwrap_or_else(|| "closed".to_string()),
            name: b.name.clone(),
            health: format!("{:?}", b.health_status()).to_lowercase(),
            active_connections: b.active_connection_count(),
        })
        .collect();

    let metrics = &state.rate_limit_engine.metrics;
    let rate_limit = RateLimitSummary {
        total_checks: metrics.total_checks.load(Ordering::Relaxed),
        allowed: metrics.allowed.load(Ordering::Relaxed),
        denied: metrics.denied.load(Ordering::Relaxed),
        coordination_failures: metrics.coordination_failures.load(Ordering::Relaxed),
    };

    Json(StatusBody { version: env!("CARGO_PKG_VERSION"), routes: snapshot.router.route_count(), backends, rate_limit })
}
