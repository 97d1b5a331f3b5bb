//! Active health checking (C5, §4.6).
//!
//! One scheduled task per registered backend; each tick performs an HTTP GET
//! to `backend.url + path` with `timeoutMs`. 2xx within timeout is a
//! success; any other status, network error, or timeout is a failure.
//! State transitions live in `state.rs`; this module just drives the timer
//! and publishes change events. Interval/timeout/path/thresholds come from
//! each `Backend`'s already-merged `health_check` config (§3's per-backend
//! `healthCheckSpec` override), not a single registry-wide setting.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::HealthCheckConfig;
use crate::load_balancer::backend::Backend;

use super::state::{HealthState, HealthStatus};

/// Published whenever a backend's health status changes, so the executor
/// can refresh any cached routing decision (§4.6).
#[derive(Debug, Clone)]
pub struct HealthChangeEvent {
    pub backend: String,
    pub status: HealthStatus,
}

/// Authoritative per-backend health records plus the running probe tasks.
pub struct HealthRegistry {
    config: HealthCheckConfig,
    states: DashMap<String, HealthState>,
    client: reqwest::Client,
    events_tx: broadcast::Sender<HealthChangeEvent>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl HealthRegistry {
    pub fn new(config: HealthCheckConfig) -> Self {
        // No client-wide timeout: each probe sets its own, since a
        // per-backend override can shorten or lengthen it (§3).
        let client = reqwest::Client::builder().build().expect("reqwest client build");
        let (events_tx, _) = broadcast::channel(256);
        Self { config, states: DashMap::new(), client, events_tx, tasks: std::sync::Mutex::new(Vec::new()) }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HealthChangeEvent> {
        self.events_tx.subscribe()
    }

    pub fn status_of(&self, backend: &str) -> HealthStatus {
        self.states.get(backend).map(|s| s.status).unwrap_or(HealthStatus::Unknown)
    }

    pub fn is_serviceable(&self, backend: &str) -> bool {
        self.states.get(backend).map(|s| s.is_serviceable()).unwrap_or(true)
    }

    /// Operator override (§4.6: `forceStatus(name, status)`).
    pub fn force_status(&self, backend: &str, status: HealthStatus) {
        let mut entry = self.states.entry(backend.to_string()).or_default();
        entry.force(status);
        let _ = self.events_tx.send(HealthChangeEvent { backend: backend.to_string(), status });
    }

    pub fn clear_force(&self, backend: &str) {
        if let Some(mut entry) = self.states.get_mut(backend) {
            entry.clear_force();
        }
    }

    /// Spawn one periodic probe task per backend. Tasks terminate when
    /// `shutdown` fires (§5: "stop health tasks"). A config reload calls this
    /// again with a fresh backend list; any tasks from the previous call are
    /// aborted first so probes never keep running against a superseded
    /// `Arc<Backend>`.
    pub fn spawn_all(self: &Arc<Self>, backends: Vec<Arc<Backend>>, shutdown: &broadcast::Sender<()>) {
        if !self.config.enabled {
            return;
        }
        let mut tasks = self.tasks.lock().expect("health task list poisoned");
        for handle in tasks.drain(..) {
            handle.abort();
        }
        for backend in backends {
            let registry = self.clone();
            let mut shutdown_rx = shutdown.subscribe();
            let handle = tokio::spawn(async move {
                // Jitter the first tick so a fleet restart doesn't thunder-herd probes.
                let jitter_ms = rand::thread_rng().gen_range(0..250);
                tokio::time::sleep(Duration::from_millis(jitter_ms)).await;

                let mut interval = tokio::time::interval(Duration::from_secs(backend.health_check.interval_secs.max(1)));
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            registry.probe_once(&backend).await;
                        }
                        _ = shutdown_rx.recv() => {
                            tracing::debug!(backend = %backend.name, "health probe task stopping");
                            break;
                        }
                    }
                }
            });
            tasks.push(handle);
        }
    }

    async fn probe_once(&self, backend: &Backend) {
        let url = format!("{}{}", backend.url.trim_end_matches('/'), backend.health_check.path);
        let outcome = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(backend.health_check.timeout_secs.max(1)))
            .send()
            .await;

        let changed = match outcome {
            Ok(resp) if resp.status().is_success() => {
                let mut entry = self.states.entry(backend.name.clone()).or_default();
                entry.record_success(backend.health_check.healthy_threshold)
            }
            Ok(resp) => {
                let mut entry = self.states.entry(backend.name.clone()).or_default();
                entry.record_failure(backend.health_check.unhealthy_threshold, format!("status {}", resp.status()))
            }
            Err(e) => {
                let mut entry = self.states.entry(backend.name.clone()).or_default();
                entry.record_failure(backend.health_check.unhealthy_threshold, e.to_string())
            }
        };

        let status = self.status_of(&backend.name);
        backend.set_health(status);

        if changed {
            tracing::info!(backend = %backend.name, status = ?status, "backend health changed");
            let _ = self.events_tx.send(HealthChangeEvent { backend: backend.name.clone(), status });
        }
    }
}
