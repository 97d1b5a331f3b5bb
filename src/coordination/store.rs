//! Capability interface exposed by the coordination store (C1).
//!
//! The interface is shaped around the three rate-limit algorithms rather
//! than exposing raw primitives (INCR, sorted-set, EVAL) one layer up: that
//! keeps the atomic unit — refill-test-write, trim-count-insert, or
//! increment-read-blend — indivisible at the trait boundary, so no caller
//! can accidentally split a scripted transaction into separate round trips.

use async_trait::async_trait;
use std::fmt;

/// Typed failure surfaced by any coordination round trip. C2 treats every
/// variant identically: fail open, log at warn, and report in the
/// observation event (§4.2).
#[derive(Debug, Clone)]
pub enum CoordinationError {
    /// The store could not be reached at all (network, DNS, auth).
    Unavailable(String),
    /// The round trip exceeded the configured command timeout.
    Timeout,
    /// The store rejected the operation (e.g. a malformed script argument).
    Protocol(String),
}

impl fmt::Display for CoordinationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinationError::Unavailable(msg) => write!(f, "coordination store unavailable: {msg}"),
            CoordinationError::Timeout => write!(f, "coordination store call timed out"),
            CoordinationError::Protocol(msg) => write!(f, "coordination store protocol error: {msg}"),
        }
    }
}

impl std::error::Error for CoordinationError {}

/// Outcome of a token-bucket check (§3: TokenBucketState).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBucketResult {
    pub allowed: bool,
    /// Tokens remaining after this check (whole-unit floor for header display).
    pub remaining: u64,
    /// Unix-ms estimate of when tokens will next reach `cost`.
    pub reset_at_ms: i64,
}

/// Outcome of either sliding-window algorithm; both report in these terms so
/// C2 can build the same response envelope regardless of which ran.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlidingWindowResult {
    pub allowed: bool,
    pub remaining: u64,
    pub reset_at_ms: i64,
}

/// Minimal capability set the rate-limit engine needs from the shared store.
///
/// Every method is a single atomic unit: implementations must not split the
/// read-test-write sequence across multiple non-atomic round trips. Retries
/// are intentionally absent from this trait — the caller (C2) decides
/// whether and how to react to failure.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Token bucket (§4.2). `max_tokens` is the burst ceiling, `refill_per_sec`
    /// is `limit / windowSeconds`, `cost` is the number of tokens requested.
    async fn token_bucket(
        &self,
        key: &str,
        max_tokens: f64,
        refill_per_sec: f64,
        cost: f64,
        now_ms: i64,
        ttl_secs: i64,
    ) -> Result<TokenBucketResult, CoordinationError>;

    /// Sliding-window log (§4.2). Trims entries older than `now - window`,
    /// counts survivors, and inserts `now:cost` iff `count + cost <= limit`.
    async fn sliding_window_log(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: i64,
        limit: u64,
        cost: u64,
        ttl_secs: i64,
    ) -> Result<SlidingWindowResult, CoordinationError>;

    /// Sliding-window counter (§4.2). Blends the previous and current
    /// sub-window counters; rolls back the increment if it would exceed
    /// `limit`.
    async fn sliding_window_counter(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: i64,
        limit: u64,
        cost: u64,
        ttl_secs: i64,
    ) -> Result<SlidingWindowResult, CoordinationError>;

    /// Drop all state for `key` (used by tests and the admin reset endpoint).
    async fn reset(&self, key: &str) -> Result<(), CoordinationError>;

    /// Cheap reachability probe for the readiness endpoint (§6).
    async fn ping(&self) -> Result<(), CoordinationError>;
}
