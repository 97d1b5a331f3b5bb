//! Circuit breaker (C6): per-backend failure tripping with half-open
//! probing. Generalizes the teacher's doc-only `resilience::circuit_breaker`
//! stub into a real closed/open/half-open state machine supporting both
//! consecutive-failure and windowed failure-rate modes (§4.7).

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::{BreakerMode, CircuitBreakerConfig};

/// Current state of a single backend's breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Outcome {
    at: Instant,
    success: bool,
}

struct BreakerState {
    state: State,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    /// Bounded rolling history for windowed failure-rate tripping.
    outcomes: VecDeque<Outcome>,
    /// Set once a half-open probe has been handed out, so only one caller
    /// at a time tests a recovering backend.
    half_open_probe_in_flight: bool,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: State::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            opened_at: None,
            outcomes: VecDeque::new(),
            half_open_probe_in_flight: false,
        }
    }
}

/// Outcome of a denied `canRequest` check: how long until a retry might
/// succeed (§4.7: "retryAfter = resetTimeoutMs − (now − openedAt)").
#[derive(Debug, Clone, Copy)]
pub struct BreakerDenied {
    pub retry_after_ms: u64,
}

/// Per-backend circuit breakers, keyed by backend name (§3: "CircuitState
/// ... owned by the breaker ... keyed by backend name").
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    states: DashMap<String, Mutex<BreakerState>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self { config, states: DashMap::new() }
    }

    fn entry(&self, backend: &str) -> dashmap::mapref::one::RefMut<'_, String, Mutex<BreakerState>> {
        self.states.entry(backend.to_string()).or_insert_with(|| Mutex::new(BreakerState::new()))
    }

    /// `canRequest() -> bool` (§4.7).
    pub fn can_request(&self, backend: &str) -> Result<(), BreakerDenied> {
        if !self.config.enabled {
            return Ok(());
        }
        let entry = self.entry(backend);
        let mut state = entry.lock().expect("breaker mutex poisoned");

        match state.state {
            State::Closed => Ok(()),
            State::Open => {
                let opened_at = state.opened_at.unwrap_or_else(Instant::now);
                let reset_timeout = Duration::from_millis(self.config.reset_timeout_ms);
                let elapsed = opened_at.elapsed();
                if elapsed >= reset_timeout {
                    state.state = State::HalfOpen;
                    state.half_open_probe_in_flight = true;
                    tracing::info!(backend, "circuit breaker transitioning to half-open");
                    Ok(())
                } else {
                    Err(BreakerDenied { retry_after_ms: (reset_timeout - elapsed).as_millis() as u64 })
                }
            }
            State::HalfOpen => {
                if state.half_open_probe_in_flight {
                    let opened_at = state.opened_at.unwrap_or_else(Instant::now);
                    let reset_timeout = Duration::from_millis(self.config.reset_timeout_ms);
                    Err(BreakerDenied {
                        retry_after_ms: reset_timeout.saturating_sub(opened_at.elapsed()).as_millis() as u64,
                    })
                } else {
                    state.half_open_probe_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    /// Record the outcome of an attempt that `can_request` admitted.
    pub fn record_outcome(&self, backend: &str, success: bool) {
        if !self.config.enabled {
            return;
        }
        let entry = self.entry(backend);
        let mut state = entry.lock().expect("breaker mutex poisoned");

        let now = Instant::now();
        state.outcomes.push_back(Outcome { at: now, success });
        let window = Duration::from_millis(self.config.failure_window_ms);
        while let Some(front) = state.outcomes.front() {
            if now.duration_since(front.at) > window {
                state.outcomes.pop_front();
            } else {
                break;
            }
        }
        while state.outcomes.len() > self.config.outcome_ring_size {
            state.outcomes.pop_front();
        }

        match state.state {
            State::Closed => {
                if success {
                    state.consecutive_failures = 0;
                } else {
                    state.consecutive_failures += 1;
                    if self.should_trip(&state) {
                        self.trip(&mut state, backend);
                    }
                }
            }
            State::HalfOpen => {
                state.half_open_probe_in_flight = false;
                if success {
                    state.consecutive_successes += 1;
                    if state.consecutive_successes >= self.config.success_threshold {
                        state.state = State::Closed;
                        state.consecutive_failures = 0;
                        state.consecutive_successes = 0;
                        state.outcomes.clear();
                        tracing::info!(backend, "circuit breaker closed after successful probes");
                    }
                } else {
                    self.trip(&mut state, backend);
                }
            }
            State::Open => {
                // A stray outcome after the breaker already re-opened; ignore.
            }
        }
    }

    fn should_trip(&self, state: &BreakerState) -> bool {
        match self.config.mode {
            BreakerMode::Consecutive => state.consecutive_failures >= self.config.failure_threshold,
            BreakerMode::Windowed => {
                let total = state.outcomes.len() as u32;
                if total < self.config.minimum_request_threshold {
                    return false;
                }
                let failures = state.outcomes.iter().filter(|o| !o.success).count() as f64;
                let rate = failures / total as f64 * 100.0;
                rate >= self.config.failure_rate_threshold
            }
        }
    }

    fn trip(&self, state: &mut BreakerState, backend: &str) {
        state.state = State::Open;
        state.opened_at = Some(Instant::now());
        state.consecutive_successes = 0;
        state.half_open_probe_in_flight = false;
        tracing::warn!(backend, "circuit breaker opened");
    }

    pub fn state_of(&self, backend: &str) -> State {
        let entry = self.entry(backend);
        entry.lock().expect("breaker mutex poisoned").state
    }

    pub fn snapshot(&self) -> Vec<(String, State)> {
        self.states
            .iter()
            .map(|e| (e.key().clone(), e.value().lock().expect("breaker mutex poisoned").state))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            enabled: true,
            mode: BreakerMode::Consecutive,
            failure_threshold: 3,
            minimum_request_threshold: 5,
            failure_rate_threshold: 50.0,
            failure_window_ms: 60_000,
            reset_timeout_ms: 50,
            success_threshold: 1,
            outcome_ring_size: 64,
        }
    }

    #[test]
    fn trips_after_consecutive_failures() {
        let registry = CircuitBreakerRegistry::new(config());
        for _ in 0..3 {
            assert!(registry.can_request("b1").is_ok());
            registry.record_outcome("b1", false);
        }
        assert!(registry.can_request("b1").is_err());
    }

    #[test]
    fn half_open_failure_reopens_and_resets_timer() {
        let registry = CircuitBreakerRegistry::new(config());
        for _ in 0..3 {
            registry.record_outcome("b1", false);
        }
        assert!(registry.can_request("b1").is_err());

        std::thread::sleep(Duration::from_millis(60));
        assert!(registry.can_request("b1").is_ok());
        registry.record_outcome("b1", false);
        assert!(registry.can_request("b1").is_err());
    }

    #[test]
    fn half_open_success_closes_breaker() {
        let registry = CircuitBreakerRegistry::new(config());
        for _ in 0..3 {
            registry.record_outcome("b1", false);
        }
        std::thread::sleep(Duration::from_millis(60));
        assert!(registry.can_request("b1").is_ok());
        registry.record_outcome("b1", true);
        assert_eq!(registry.state_of("b1"), State::Closed);
    }
}
