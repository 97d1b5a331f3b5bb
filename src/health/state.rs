//! Backend health state machine (C5, §3: HealthState).
//!
//! # State Transitions
//! ```text
//! healthy   → degraded:  first failure
//! degraded  → unhealthy: consecutive failures >= unhealthyThreshold
//! unhealthy → degraded:  first success
//! degraded  → healthy:   consecutive successes >= healthyThreshold
//! unknown is the initial state until the first check completes
//! ```
//!
//! # Design Decisions
//! - Hysteresis (the degraded stopover) prevents flapping on a single blip
//! - Counters reset on transition, not on every probe
//! - `forced` (operator override via `forceStatus`) bypasses threshold logic
//!   entirely until cleared

use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

/// Per-backend health record (§3: "last check time, last success time, last
/// error, consecutive counters, rolling totals").
#[derive(Debug, Clone)]
pub struct HealthState {
    pub status: HealthStatus,
    pub last_check: Option<Instant>,
    pub last_success: Option<Instant>,
    pub last_error: Option<String>,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
    pub total_checks: u64,
    pub total_failures: u64,
    forced: bool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            status: HealthStatus::Unknown,
            last_check: None,
            last_success: None,
            last_error: None,
            consecutive_successes: 0,
            consecutive_failures: 0,
            total_checks: 0,
            total_failures: 0,
            forced: false,
        }
    }
}

impl HealthState {
    /// Record a successful probe. Returns `true` if the status changed.
    pub fn record_success(&mut self, healthy_threshold: u32) -> bool {
        self.total_checks += 1;
        self.last_check = Some(Instant::now());
        self.last_success = self.last_check;
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;

        if self.forced {
            return false;
        }

        let previous = self.status;
        self.status = match self.status {
            HealthStatus::Unknown | HealthStatus::Unhealthy => HealthStatus::Degraded,
            HealthStatus::Degraded => {
                if self.consecutive_successes >= healthy_threshold {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Degraded
                }
            }
            HealthStatus::Healthy => HealthStatus::Healthy,
        };

        previous != self.status
    }

    /// Record a failed probe (network error, timeout, or non-2xx). Returns
    /// `true` if the status changed.
    pub fn record_failure(&mut self, unhealthy_threshold: u32, error: impl Into<String>) -> bool {
        self.total_checks += 1;
        self.total_failures += 1;
        self.last_check = Some(Instant::now());
        self.last_error = Some(error.into());
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;

        if self.forced {
            return false;
        }

        let previous = self.status;
        self.status = match self.status {
            HealthStatus::Healthy | HealthStatus::Unknown => HealthStatus::Degraded,
            HealthStatus::Degraded => {
                if self.consecutive_failures >= unhealthy_threshold {
                    HealthStatus::Unhealthy
                } else {
                    HealthStatus::Degraded
                }
            }
            HealthStatus::Unhealthy => HealthStatus::Unhealthy,
        };

        previous != self.status
    }

    /// Operator override (§4.6: `forceStatus(name, status)`).
    pub fn force(&mut self, status: HealthStatus) {
        self.forced = true;
        self.status = status;
    }

    pub fn clear_force(&mut self) {
        self.forced = false;
    }

    /// Whether a backend in this state should still receive traffic.
    pub fn is_serviceable(&self) -> bool {
        !matches!(self.status, HealthStatus::Unhealthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_healthy_under_stable_success() {
        let mut state = HealthState::default();
        for _ in 0..2 {
            state.record_success(2);
        }
        assert_eq!(state.status, HealthStatus::Healthy);
    }

    #[test]
    fn healthy_drops_to_degraded_on_first_failure_then_unhealthy() {
        let mut state = HealthState::default();
        state.record_success(1);
        assert_eq!(state.status, HealthStatus::Healthy);

        assert!(state.record_failure(3, "timeout"));
        assert_eq!(state.status, HealthStatus::Degraded);

        state.record_failure(3, "timeout");
        assert!(state.record_failure(3, "timeout"));
        assert_eq!(state.status, HealthStatus::Unhealthy);
    }

    #[test]
    fn unhealthy_recovers_through_degraded() {
        let mut state = HealthState::default();
        for _ in 0..3 {
            state.record_failure(3, "err");
        }
        assert_eq!(state.status, HealthStatus::Unhealthy);

        assert!(state.record_success(2));
        assert_eq!(state.status, HealthStatus::Degraded);

        assert!(state.record_success(2));
        assert_eq!(state.status, HealthStatus::Healthy);
    }

    #[test]
    fn forced_status_ignores_probes() {
        let mut state = HealthState::default();
        state.force(HealthStatus::Healthy);
        state.record_failure(1, "err");
        assert_eq!(state.status, HealthStatus::Healthy);
    }
}
