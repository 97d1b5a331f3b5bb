//! Backend registry.
//!
//! Each configured backend is a single named upstream (§3), not a pool of
//! interchangeable instances, so this is a name-keyed lookup rather than a
//! load-balanced group selector: ordering across same-route candidates is
//! `routing::Router`'s job, and this registry just hands back the `Backend`
//! for a resolved name.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{BackendConfig, HealthCheckConfig};
use crate::load_balancer::backend::{Backend, BackendConnectionGuard};

#[derive(Debug)]
pub struct BackendManager {
    backends: HashMap<String, Arc<Backend>>,
}

impl BackendManager {
    /// `default_health_check` is the global health-check config; each
    /// backend's own `health_check` override (if any) is merged over it.
    pub fn new(configs: &[BackendConfig], default_health_check: &HealthCheckConfig) -> Self {
        let mut backends = HashMap::with_capacity(configs.len());
        for config in configs {
            let health_check = default_health_check.merged_with(config.health_check.as_ref());
            let backend = Arc::new(Backend::new(
                config.name.clone(),
                config.url.clone(),
                config.max_connections,
                config.timeout_secs,
                config.retries,
                health_check,
            ));
            backends.insert(config.name.clone(), backend);
        }
        Self { backends }
    }

    pub fn get(&self, name: &str) -> Option<Arc<Backend>> {
        self.backends.get(name).cloned()
    }

    /// Acquire a connection guard for `name`, enforcing `max_connections`.
    /// Returns `None` if the backend is unknown or at capacity.
    pub fn acquire(&self, name: &str) -> Option<BackendConnectionGuard> {
        self.backends.get(name)?.try_create_guard()
    }

    pub fn all_backends(&self) -> Vec<Arc<Backend>> {
        self.backends.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str) -> BackendConfig {
        BackendConfig {
            name: name.to_string(),
            url: "http://localhost:9000".to_string(),
            weight: 1,
            timeout_secs: None,
            retries: None,
            max_connections: 10,
            health_check: None,
        }
    }

    #[test]
    fn acquire_respects_capacity() {
        let manager = BackendManager::new(&[config("b1")], &HealthCheckConfig::default());
        let guard = manager.acquire("b1");
        assert!(guard.is_some());
        assert!(manager.get("missing").is_none());
    }
}
