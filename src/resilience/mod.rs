//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → timeouts.rs (enforce connect/request timeout)
//!     → On failure: retries.rs (check if retryable), backoff.rs (delay)
//!     → crate::circuit_breaker (track failures, open circuit if threshold exceeded)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Retries only for idempotent requests (GET, HEAD, etc.) or bodies the
//!   executor has buffered
//! - All resilience logic is composable, not middleware-chained (§9)

pub mod backoff;
pub mod retries;
pub mod timeouts;
