//! In-process test double for [`CoordinationStore`].
//!
//! Atomicity is provided by a `dashmap` shard lock per key rather than a Lua
//! script, but the observable contract is identical: no caller ever sees a
//! partially-applied refill/trim/blend. Used by integration tests (in place
//! of a real Redis) and by fail-open tests via [`MemoryStore::set_failing`].

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::store::{CoordinationError, CoordinationStore, SlidingWindowResult, TokenBucketResult};

struct BucketState {
    tokens: f64,
    last_refill_ms: i64,
}

struct LogState {
    entries: Vec<(i64, u64)>,
}

struct CounterState {
    window_start_ms: i64,
    current: u64,
    previous: u64,
}

/// In-memory coordination store. `set_failing(true)` makes every subsequent
/// call return [`CoordinationError::Unavailable`], used to exercise the
/// rate-limiter's fail-open path in tests.
#[derive(Default)]
pub struct MemoryStore {
    buckets: DashMap<String, Mutex<BucketState>>,
    logs: DashMap<String, Mutex<LogState>>,
    counters: DashMap<String, Mutex<CounterState>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_failing(&self) -> Result<(), CoordinationError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(CoordinationError::Unavailable("memory store forced failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn token_bucket(
        &self,
        key: &str,
        max_tokens: f64,
        refill_per_sec: f64,
        cost: f64,
        now_ms: i64,
        _ttl_secs: i64,
    ) -> Result<TokenBucketResult, CoordinationError> {
        self.check_failing()?;
        let entry = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| {
                Mutex::new(BucketState {
                    tokens: max_tokens,
                    last_refill_ms: now_ms,
                })
            });
        let mut state = entry.lock().expect("bucket mutex poisoned");

        let elapsed_secs = (now_ms - state.last_refill_ms).max(0) as f64 / 1000.0;
        state.tokens = (state.tokens + elapsed_secs * refill_per_sec).min(max_tokens);
        state.last_refill_ms = now_ms;

        let allowed = state.tokens >= cost;
        if allowed {
            state.tokens -= cost;
        }

        let deficit = cost - state.tokens;
        let reset_at_ms = if deficit <= 0.0 || refill_per_sec <= 0.0 {
            now_ms
        } else {
            now_ms + ((deficit / refill_per_sec) * 1000.0).ceil() as i64
        };

        Ok(TokenBucketResult {
            allowed,
            remaining: state.tokens.floor().max(0.0) as u64,
            reset_at_ms,
        })
    }

    async fn sliding_window_log(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: i64,
        limit: u64,
        cost: u64,
        _ttl_secs: i64,
    ) -> Result<SlidingWindowResult, CoordinationError> {
        self.check_failing()?;
        let entry = self
            .logs
            .entry(key.to_string())
            .or_insert_with(|| Mutex::new(LogState { entries: Vec::new() }));
        let mut state = entry.lock().expect("log mutex poisoned");

        let cutoff = now_ms - window_ms;
        state.entries.retain(|(ts, _)| *ts > cutoff);

        let count: u64 = state.entries.iter().map(|(_, c)| *c).sum();
        let allowed = count + cost <= limit;
        if allowed {
            state.entries.push((now_ms, cost));
        }

        let remaining = limit.saturating_sub(count + if allowed { cost } else { 0 });
        let reset_at_ms = state
            .entries
            .iter()
            .map(|(ts, _)| *ts)
            .min()
            .map(|oldest| oldest + window_ms)
            .unwrap_or(now_ms);

        Ok(SlidingWindowResult { allowed, remaining, reset_at_ms })
    }

    async fn sliding_window_counter(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: i64,
        limit: u64,
        cost: u64,
        _ttl_secs: i64,
    ) -> Result<SlidingWindowResult, CoordinationError> {
        self.check_failing()?;
        let entry = self
            .counters
            .entry(key.to_string())
            .or_insert_with(|| {
                Mutex::new(CounterState {
                    window_start_ms: now_ms - (now_ms % window_ms.max(1)),
                    current: 0,
                    previous: 0,
                })
            });
        let mut state = entry.lock().expect("counter mutex poisoned");

        let elapsed = now_ms - state.window_start_ms;
        if elapsed >= window_ms {
            let windows_elapsed = elapsed / window_ms.max(1);
            if windows_elapsed == 1 {
                state.previous = state.current;
            } else {
                state.previous = 0;
            }
            state.current = 0;
            state.window_start_ms += windows_elapsed * window_ms;
        }

        let progress = (now_ms - state.window_start_ms) as f64 / window_ms.max(1) as f64;
        let progress = progress.clamp(0.0, 1.0);

        let weighted_existing = state.previous as f64 * (1.0 - progress) + state.current as f64;
        let projected = weighted_existing + cost as f64;

        let allowed = projected <= limit as f64;
        if allowed {
            state.current += cost;
        }

        let effective = state.previous as f64 * (1.0 - progress) + state.current as f64;
        let remaining = (limit as f64 - effective).max(0.0).floor() as u64;
        let reset_at_ms = state.window_start_ms + window_ms;

        Ok(SlidingWindowResult { allowed, remaining, reset_at_ms })
    }

    async fn reset(&self, key: &str) -> Result<(), CoordinationError> {
        self.check_failing()?;
        self.buckets.remove(key);
        self.logs.remove(key);
        self.counters.remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<(), CoordinationError> {
        self.check_failing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_bucket_allows_up_to_limit_then_denies() {
        let store = MemoryStore::new();
        let mut allowed_count = 0;
        for _ in 0..5 {
            let r = store.token_bucket("k", 2.0, 2.0, 1.0, 0, 60).await.unwrap();
            if r.allowed {
                allowed_count += 1;
            }
        }
        assert_eq!(allowed_count, 2);
    }

    #[tokio::test]
    async fn sliding_log_enforces_exact_bound() {
        let store = MemoryStore::new();
        for _ in 0..10 {
            let r = store.sliding_window_log("k", 0, 60_000, 10, 1, 120).await.unwrap();
            assert!(r.allowed);
        }
        let r = store.sliding_window_log("k", 0, 60_000, 10, 1, 120).await.unwrap();
        assert!(!r.allowed);
    }

    #[tokio::test]
    async fn fail_open_surfaces_as_error() {
        let store = MemoryStore::new();
        store.set_failing(true);
        let result = store.token_bucket("k", 2.0, 2.0, 1.0, 0, 60).await;
        assert!(result.is_err());
    }
}
