//! Rate-limit engine (C2): the three interchangeable algorithms, run
//! through whichever atomic coordination-store operation the matched rule
//! selects, with fail-open on coordination outage (§4.2).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::RateLimitAlgorithm;
use crate::coordination::CoordinationStore;

use super::rules::MatchedRule;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Result of a single admission check, already in the units the executor
/// and transform pipeline need (seconds, not ms; whole-request counts).
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// Unix seconds at which the window/bucket resets.
    pub reset_at: u64,
    /// Only meaningful (and only surfaced to the client) when denied.
    pub retry_after: Option<u64>,
    pub algorithm: &'static str,
    /// Set when the coordination store failed and this result reflects the
    /// fail-open policy rather than a real decision (§4.2, testable
    /// property 3).
    pub coordination_failed: bool,
}

/// Per-algorithm, per-tier in-process counters read by the observation
/// emitter (§4.2: "these are read by the observation emitter; the core
/// does not aggregate them further").
#[derive(Default)]
pub struct EngineMetrics {
    pub total_checks: AtomicU64,
    pub allowed: AtomicU64,
    pub denied: AtomicU64,
    pub bypassed: AtomicU64,
    pub coordination_failures: AtomicU64,
}

/// Anything longer than this is treated as a fail-open signal (§5).
const LATENCY_BUDGET: Duration = Duration::from_millis(50);

pub struct RateLimitEngine {
    store: Arc<dyn CoordinationStore>,
    key_prefix: String,
    pub metrics: EngineMetrics,
}

impl RateLimitEngine {
    pub fn new(store: Arc<dyn CoordinationStore>, key_prefix: String) -> Self {
        Self { store, key_prefix, metrics: EngineMetrics::default() }
    }

    /// `check(key, limit, windowSeconds, cost) -> {allowed, remaining, limit, resetAt, retryAfter}` (§4.2).
    pub async fn check(&self, rule: &MatchedRule, key: &str, cost: u64) -> CheckResult {
        self.metrics.total_checks.fetch_add(1, Ordering::Relaxed);
        let full_key = format!("{}{}", self.key_prefix, key);
        let ttl_secs = (rule.window_seconds.max(1) * 2) as i64;
        let now = now_ms();

        let outcome = tokio::time::timeout(LATENCY_BUDGET, self.dispatch(rule, &full_key, now, ttl_secs, cost)).await;

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, key = %full_key, "rate-limit coordination call failed, failing open");
                self.fail_open(rule)
            }
            Err(_) => {
                tracing::warn!(key = %full_key, "rate-limit coordination call exceeded latency budget, failing open");
                self.fail_open(rule)
            }
        };

        if result.coordination_failed {
            self.metrics.coordination_failures.fetch_add(1, Ordering::Relaxed);
        }
        if result.allowed {
            self.metrics.allowed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.metrics.denied.fetch_add(1, Ordering::Relaxed);
        }

        result
    }

    /// Non-mutating peek, implemented as a zero-cost check so it still runs
    /// inside the atomic script rather than reading store state directly
    /// (§5 forbids reads outside the script; a zero-cost check satisfies
    /// both that and §4.2's `peek` contract).
    pub async fn peek(&self, rule: &MatchedRule, key: &str) -> Option<CheckResult> {
        let result = self.check(rule, key, 0).await;
        if result.coordination_failed {
            None
        } else {
            Some(result)
        }
    }

    /// Passthrough reachability probe for the readiness endpoint (§6).
    pub async fn ping(&self) -> Result<(), crate::coordination::CoordinationError> {
        self.store.ping().await
    }

    pub async fn reset(&self, key: &str) {
        let full_key = format!("{}{}", self.key_prefix, key);
        if let Err(e) = self.store.reset(&full_key).await {
            tracing::warn!(error = %e, key = %full_key, "failed to reset rate-limit key");
        }
    }

    async fn dispatch(
        &self,
        rule: &MatchedRule,
        key: &str,
        now_ms: i64,
        ttl_secs: i64,
        cost: u64,
    ) -> Result<CheckResult, crate::coordination::CoordinationError> {
        let limit = rule.requests;
        let window_ms = (rule.window_seconds.max(1) * 1000) as i64;

        match rule.algorithm {
            RateLimitAlgorithm::TokenBucket => {
                let max_tokens = rule.burst.unwrap_or(limit) as f64;
                let refill_per_sec = limit as f64 / rule.window_seconds.max(1) as f64;
                let r = self
                    .store
                    .token_bucket(key, max_tokens, refill_per_sec, cost as f64, now_ms, ttl_secs)
                    .await?;
                Ok(CheckResult {
                    allowed: r.allowed,
                    limit,
                    remaining: r.remaining,
                    reset_at: (r.reset_at_ms / 1000).max(0) as u64,
                    retry_after: retry_after_secs(r.allowed, now_ms, r.reset_at_ms),
                    algorithm: "token_bucket",
                    coordination_failed: false,
                })
            }
            RateLimitAlgorithm::SlidingWindowLog => {
                let r = self.store.sliding_window_log(key, now_ms, window_ms, limit, cost, ttl_secs).await?;
                Ok(CheckResult {
                    allowed: r.allowed,
                    limit,
                    remaining: r.remaining,
                    reset_at: (r.reset_at_ms / 1000).max(0) as u64,
                    retry_after: retry_after_secs(r.allowed, now_ms, r.reset_at_ms),
                    algorithm: "sliding_window_log",
                    coordination_failed: false,
                })
            }
            RateLimitAlgorithm::SlidingWindowCounter => {
                let r = self.store.sliding_window_counter(key, now_ms, window_ms, limit, cost, ttl_secs).await?;
                Ok(CheckResult {
                    allowed: r.allowed,
                    limit,
                    remaining: r.remaining,
                    reset_at: (r.reset_at_ms / 1000).max(0) as u64,
                    retry_after: retry_after_secs(r.allowed, now_ms, r.reset_at_ms),
                    algorithm: "sliding_window_counter",
                    coordination_failed: false,
                })
            }
        }
    }

    fn fail_open(&self, rule: &MatchedRule) -> CheckResult {
        CheckResult {
            allowed: true,
            limit: rule.requests,
            remaining: rule.requests,
            reset_at: (now_ms() / 1000) as u64 + rule.window_seconds,
            retry_after: None,
            algorithm: rule.algorithm.as_static_str(),
            coordination_failed: true,
        }
    }
}

fn retry_after_secs(allowed: bool, now_ms: i64, reset_at_ms: i64) -> Option<u64> {
    if allowed {
        return None;
    }
    Some(((reset_at_ms - now_ms).max(0) as f64 / 1000.0).ceil() as u64)
}

impl RateLimitAlgorithm {
    fn as_static_str(self) -> &'static str {
        match self {
            RateLimitAlgorithm::TokenBucket => "token_bucket",
            RateLimitAlgorithm::SlidingWindowLog => "sliding_window_log",
            RateLimitAlgorithm::SlidingWindowCounter => "sliding_window_counter",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyStrategy;
    use crate::coordination::MemoryStore;

    fn rule(algorithm: RateLimitAlgorithm, requests: u64, window_seconds: u64) -> MatchedRule {
        MatchedRule {
            source: "test".into(),
            algorithm,
            requests,
            window_seconds,
            burst: None,
            key_strategy: KeyStrategy::Ip,
        }
    }

    #[tokio::test]
    async fn token_bucket_denies_past_limit() {
        let engine = RateLimitEngine::new(Arc::new(MemoryStore::new()), "gatecore:rl:".into());
        let r = rule(RateLimitAlgorithm::TokenBucket, 2, 60);
        assert!(engine.check(&r, "k", 1).await.allowed);
        assert!(engine.check(&r, "k", 1).await.allowed);
        assert!(!engine.check(&r, "k", 1).await.allowed);
    }

    #[tokio::test]
    async fn coordination_outage_fails_open() {
        let store = Arc::new(MemoryStore::new());
        store.set_failing(true);
        let engine = RateLimitEngine::new(store, "gatecore:rl:".into());
        let r = rule(RateLimitAlgorithm::TokenBucket, 1, 60);
        let result = engine.check(&r, "k", 1).await;
        assert!(result.allowed);
        assert!(result.coordination_failed);
    }
}
