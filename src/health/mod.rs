//! Health checking subsystem (C5, §4.6).
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer, one task per backend
//!     → GET backend.url + path
//!     → Update state.rs, publish HealthChangeEvent
//!     → write-through to Backend's cached atomic health word
//! ```
//!
//! Request-outcome-driven failure tracking is the circuit breaker's job
//! (`crate::circuit_breaker`), not a second health-state writer here; the
//! spec names one health-state owner, the active probe loop.
//!
//! # Design Decisions
//! - State transitions require consecutive successes/failures (hysteresis)
//! - Health state is per-backend name, single writer (the probe task)

pub mod active;
pub mod state;
