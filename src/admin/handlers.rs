use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::health::state::HealthStatus;

use super::AdminState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub routes: usize,
    pub backends: usize,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let snapshot = state.gateway.snapshot.load();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        routes: snapshot.router.route_count(),
        backends: snapshot.backends.len(),
    })
}

#[derive(Serialize)]
pub struct BackendStatus {
    pub name: String,
    pub url: String,
    pub health: HealthStatus,
    pub active_connections: usize,
    pub max_connections: usize,
}

pub async fn get_backends(State(state): State<AdminState>) -> Json<Vec<BackendStatus>> {
    let snapshot = state.gateway.snapshot.load();
    let statuses = snapshot
        .backends
        .all_backends()
        .into_iter()
        .map(|b| BackendStatus {
            name: b.name.clone(),
            url: b.url.clone(),
            health: b.health_status(),
            active_connections: b.active_connection_count(),
            max_connections: b.max_connections,
        })
        .collect();
    Json(statuses)
}

#[derive(Serialize)]
pub struct BreakerStatus {
    pub backend: String,
    pub state: String,
}

pub async fn get_breakers(State(state): State<AdminState>) -> Json<Vec<BreakerStatus>> {
    let statuses = state
        .gateway
        .breakers
        .snapshot()
        .into_iter()
        .map(|(backend, breaker_state)| BreakerStatus { backend, state: format!("{breaker_state:?}").to_lowercase() })
        .collect();
    Json(statuses)
}

#[derive(Deserialize)]
pub struct ForceHealthBody {
    pub status: HealthStatus,
}

/// Operator override (§4.6: `forceStatus`), e.g. to pull a backend out of
/// rotation ahead of planned maintenance without waiting on probe hysteresis.
pub async fn force_health(
    State(state): State<AdminState>,
    Path(backend): Path<String>,
    Json(body): Json<ForceHealthBody>,
) -> StatusCode {
    state.gateway.health.force_status(&backend, body.status);
    StatusCode::NO_CONTENT
}

pub async fn clear_health(State(state): State<AdminState>, Path(backend): Path<String>) -> StatusCode {
    state.gateway.health.clear_force(&backend);
    StatusCode::NO_CONTENT
}
