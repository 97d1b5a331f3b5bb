//! Shared-state client subsystem (C1).
//!
//! A thin capability interface over an external coordination store: the rate
//! limiter's three algorithms each run as a single atomic round trip so that
//! concurrent gateway instances never race (§9: "preserve the atomicity, not
//! split the script into multiple round-trips"). Connection loss surfaces as
//! a typed [`CoordinationError`] so C2 can apply its fail-open policy.
//!
//! [`MemoryStore`] is an in-process test double with the same atomicity
//! guarantees (a per-key mutex stands in for the Lua script); [`RedisStore`]
//! is the production client.

pub mod memory_store;
pub mod redis_store;
pub mod store;

use std::sync::Arc;

pub use memory_store::MemoryStore;
pub use redis_store::RedisStore;
pub use store::{CoordinationError, CoordinationStore, SlidingWindowResult, TokenBucketResult};

use crate::config::CoordinationConfig;

/// Connect to the configured coordination store, degrading to an in-process
/// `MemoryStore` if it's unreachable at startup. The rate limiter's
/// fail-open policy (§4.2) concerns runtime outages; refusing to boot over a
/// missing Redis at process start would be stricter than that policy, not
/// an instance of it, so this applies the same philosophy one step earlier.
/// A `MemoryStore` fallback only coordinates within this single process —
/// acceptable degradation, not full-fidelity multi-instance operation.
pub async fn connect(config: &CoordinationConfig) -> Arc<dyn CoordinationStore> {
    match RedisStore::connect(&config.url).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!(error = %e, url = %config.url, "failed to connect to coordination store at startup, falling back to in-process store");
            Arc::new(MemoryStore::new())
        }
    }
}
