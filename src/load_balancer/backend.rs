//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single named upstream (§3: "Identity `name`; `url`")
//! - Track active connections against `max_connections`
//! - Expose a cheap atomic health read for the hot request path; the
//!   authoritative, hysteresis-bearing record lives in
//!   `health::active::HealthRegistry`, which writes through to this word on
//!   every state transition (§3: "single writer per key", §5)

use std::ops::Deref;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::HealthCheckConfig;
use crate::health::state::HealthStatus;

/// A single named backend/upstream.
#[derive(Debug)]
pub struct Backend {
    pub name: String,
    /// scheme://host:port
    pub url: String,
    pub timeout_secs: Option<u64>,
    pub retries: Option<u32>,
    pub max_connections: usize,
    /// Health-check settings for this backend, already merged with any
    /// per-backend override (§3: Backend's embedded `healthCheckSpec`).
    pub health_check: HealthCheckConfig,
    active_connections: AtomicUsize,
    /// `HealthStatus` encoded as a byte; see `encode_status`/`decode_status`.
    health: AtomicU8,
}

impl Backend {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        max_connections: usize,
        timeout_secs: Option<u64>,
        retries: Option<u32>,
        health_check: HealthCheckConfig,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            timeout_secs,
            retries,
            max_connections,
            health_check,
            active_connections: AtomicUsize::new(0),
            health: AtomicU8::new(encode_status(HealthStatus::Unknown)),
        }
    }

    pub fn active_connection_count(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn set_health(&self, status: HealthStatus) {
        self.health.store(encode_status(status), Ordering::Relaxed);
    }

    pub fn health_status(&self) -> HealthStatus {
        decode_status(self.health.load(Ordering::Relaxed))
    }

    /// A candidate is servicable if its cached health word isn't `unhealthy`.
    /// `unknown` backends are still tried so a fresh backend isn't starved
    /// before its first health probe completes.
    pub fn is_healthy(&self) -> bool {
        !matches!(self.health_status(), HealthStatus::Unhealthy)
    }

    /// Try to create a connection guard that increments the active count.
    /// Returns `None` if `max_connections` is already reached.
    pub fn try_create_guard(self: &Arc<Self>) -> Option<BackendConnectionGuard> {
        let mut prev = self.active_connections.load(Ordering::Relaxed);
        loop {
            if prev >= self.max_connections {
                return None;
            }
            match self.active_connections.compare_exchange_weak(
                prev,
                prev + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => prev = x,
            }
        }
        Some(BackendConnectionGuard { backend: self.clone() })
    }

    fn dec_connections(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }
}

fn encode_status(status: HealthStatus) -> u8 {
    match status {
        HealthStatus::Healthy => 0,
        HealthStatus::Degraded => 1,
        HealthStatus::Unhealthy => 2,
        HealthStatus::Unknown => 3,
    }
}

fn decode_status(byte: u8) -> HealthStatus {
    match byte {
        0 => HealthStatus::Healthy,
        1 => HealthStatus::Degraded,
        2 => HealthStatus::Unhealthy,
        _ => HealthStatus::Unknown,
    }
}

/// RAII guard releasing the connection slot on drop.
#[derive(Debug)]
pub struct BackendConnectionGuard {
    pub backend: Arc<Backend>,
}

impl Deref for BackendConnectionGuard {
    type Target = Backend;
    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl Drop for BackendConnectionGuard {
    fn drop(&mut self) {
        self.backend.dec_connections();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_enforces_max_connections() {
        let backend = Arc::new(Backend::new("b1", "http://localhost:9000", 1, None, None, HealthCheckConfig::default()));
        let g1 = backend.try_create_guard();
        assert!(g1.is_some());
        assert!(backend.try_create_guard().is_none());
        drop(g1);
        assert!(backend.try_create_guard().is_some());
    }

    #[test]
    fn unknown_backend_is_healthy_by_default() {
        let backend = Backend::new("b1", "http://localhost:9000", 10, None, None, HealthCheckConfig::default());
        assert!(backend.is_healthy());
        backend.set_health(HealthStatus::Unhealthy);
        assert!(!backend.is_healthy());
    }
}
