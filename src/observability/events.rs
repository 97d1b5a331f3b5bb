//! Observation events (§3: ObservationEvent).
//!
//! Emitted after each proxied request. The core only emits; it never stores
//! or aggregates these beyond the in-process counters already kept by
//! `rate_limit::engine::EngineMetrics` (§4.2: "read by the observation
//! emitter; the core does not aggregate them further"). Emission is
//! best-effort: a structured log line plus a metrics update, both
//! non-blocking.

use std::net::IpAddr;
use std::time::Duration;

use serde::Serialize;

use crate::context::RequestContext;

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitOutcomeEvent {
    pub allowed: bool,
    pub bypassed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub algorithm: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ObservationEvent {
    pub request_id: String,
    pub path: String,
    pub method: String,
    pub status_code: u16,
    pub duration_ms: u128,
    pub backend: Option<String>,
    pub ip: IpAddr,
    pub principal: Option<String>,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub rate_limit: Option<RateLimitOutcomeEvent>,
    pub error: Option<String>,
}

impl ObservationEvent {
    pub fn new(
        ctx: &RequestContext,
        status_code: u16,
        duration: Duration,
        backend: Option<String>,
        bytes_in: u64,
        bytes_out: u64,
        error: Option<String>,
    ) -> Self {
        Self {
            request_id: ctx.request_id.clone(),
            path: ctx.path.clone(),
            method: ctx.method.to_string(),
            status_code,
            duration_ms: duration.as_millis(),
            backend,
            ip: ctx.client_ip,
            principal: ctx.user_id().map(str::to_string),
            bytes_in,
            bytes_out,
            rate_limit: ctx.rate_limit.as_ref().map(|r| RateLimitOutcomeEvent {
                allowed: r.allowed,
                bypassed: r.bypassed,
                limit: r.limit,
                remaining: r.remaining,
                algorithm: r.algorithm,
            }),
            error,
        }
    }
}

/// Best-effort, non-blocking emission (§3: "the core treats emission as
/// best-effort and non-blocking"). A structured log line today; a typed
/// channel to an external sink is the natural extension point.
pub fn emit(event: &ObservationEvent) {
    tracing::info!(
        request_id = %event.request_id,
        path = %event.path,
        method = %event.method,
        status = event.status_code,
        duration_ms = event.duration_ms,
        backend = ?event.backend,
        ip = %event.ip,
        principal = ?event.principal,
        bytes_in = event.bytes_in,
        bytes_out = event.bytes_out,
        rate_limit_allowed = event.rate_limit.as_ref().map(|r| r.allowed),
        error = ?event.error,
        "observation event"
    );
}
