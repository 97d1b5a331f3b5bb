//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize subsystems in dependency order: coordination store, rate
//!   limiter, circuit breaker, health registry, router, backend registry
//! - Start background tasks (health probes, metrics exporter) before
//!   binding the listener, so traffic never arrives before they're running
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, the process exits non-zero
//! - Listener binds last; see `main.rs` for the concrete ordering

pub const DEFAULT_DRAIN_DEADLINE_SECS: u64 = 30;
