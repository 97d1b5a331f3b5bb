//! Production coordination store backed by Redis.
//!
//! Each algorithm is a single `EVAL` of a Lua script so the refill-test-write
//! (or trim-count-insert, or increment-read-blend) sequence is atomic from
//! every other gateway instance's point of view, exactly as required by
//! §9's "shared-state scripting" note. `ConnectionManager` handles
//! reconnection transparently; this module never retries on top of it (§4.1:
//! "retries within the client are disabled").

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

use super::store::{CoordinationError, CoordinationStore, SlidingWindowResult, TokenBucketResult};

/// Loads `(tokens, last_refill_ms)`, refills by elapsed time, tests against
/// `cost`, writes back, and sets a TTL. Returns `{allowed, remaining, reset_at_ms}`.
const TOKEN_BUCKET_SCRIPT: &str = r#"
local key = KEYS[1]
local max_tokens = tonumber(ARGV[1])
local refill_per_sec = tonumber(ARGV[2])
local cost = tonumber(ARGV[3])
local now_ms = tonumber(ARGV[4])
local ttl_secs = tonumber(ARGV[5])

local raw = redis.call('HMGET', key, 'tokens', 'last_refill_ms')
local tokens = tonumber(raw[1])
local last_refill_ms = tonumber(raw[2])
if tokens == nil then
    tokens = max_tokens
    last_refill_ms = now_ms
end

local elapsed_secs = math.max(0, now_ms - last_refill_ms) / 1000.0
tokens = math.min(max_tokens, tokens + elapsed_secs * refill_per_sec)

local allowed = 0
if tokens >= cost then
    allowed = 1
    tokens = tokens - cost
end

redis.call('HMSET', key, 'tokens', tokens, 'last_refill_ms', now_ms)
redis.call('EXPIRE', key, ttl_secs)

local deficit = cost - tokens
local reset_at_ms = now_ms
if deficit > 0 and refill_per_sec > 0 then
    reset_at_ms = now_ms + math.ceil((deficit / refill_per_sec) * 1000.0)
end

return {allowed, math.floor(tokens), reset_at_ms}
"#;

/// Trims the sorted set by score, counts survivors, and inserts `now:cost`
/// iff the count would not exceed `limit`.
const SLIDING_WINDOW_LOG_SCRIPT: &str = r#"
local key = KEYS[1]
local now_ms = tonumber(ARGV[1])
local window_ms = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
local cost = tonumber(ARGV[4])
local ttl_secs = tonumber(ARGV[5])
local member = ARGV[6]

local cutoff = now_ms - window_ms
redis.call('ZREMRANGEBYSCORE', key, '-inf', cutoff)

local count = redis.call('ZCARD', key)
local allowed = 0
if count + cost <= limit then
    allowed = 1
    for i = 1, cost do
        redis.call('ZADD', key, now_ms, member .. ':' .. i)
    end
end
redis.call('EXPIRE', key, ttl_secs)

local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
local reset_at_ms = now_ms
if oldest[2] ~= nil then
    reset_at_ms = tonumber(oldest[2]) + window_ms
end

local remaining = limit - count
if allowed == 1 then
    remaining = remaining - cost
end
if remaining < 0 then
    remaining = 0
end

return {allowed, remaining, reset_at_ms}
"#;

/// Increments the current sub-window counter, reads the previous one,
/// computes the blended estimate, and rolls back if it exceeds `limit`.
const SLIDING_WINDOW_COUNTER_SCRIPT: &str = r#"
local key = KEYS[1]
local now_ms = tonumber(ARGV[1])
local window_ms = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
local cost = tonumber(ARGV[4])
local ttl_secs = tonumber(ARGV[5])

local raw = redis.call('HMGET', key, 'window_start_ms', 'current', 'previous')
local window_start_ms = tonumber(raw[1])
local current = tonumber(raw[2]) or 0
local previous = tonumber(raw[3]) or 0

if window_start_ms == nil then
    window_start_ms = now_ms - (now_ms % window_ms)
end

local elapsed = now_ms - window_start_ms
if elapsed >= window_ms then
    local windows_elapsed = math.floor(elapsed / window_ms)
    if windows_elapsed == 1 then
        previous = current
    else
        previous = 0
    end
    current = 0
    window_start_ms = window_start_ms + windows_elapsed * window_ms
end

local progress = (now_ms - window_start_ms) / window_ms
if progress > 1 then progress = 1 end
if progress < 0 then progress = 0 end

local projected = previous * (1 - progress) + current + cost
local allowed = 0
if projected <= limit then
    allowed = 1
    current = current + cost
end

redis.call('HMSET', key, 'window_start_ms', window_start_ms, 'current', current, 'previous', previous)
redis.call('EXPIRE', key, ttl_secs)

local effective = previous * (1 - progress) + current
local remaining = math.floor(limit - effective)
if remaining < 0 then remaining = 0 end
local reset_at_ms = window_start_ms + window_ms

return {allowed, remaining, reset_at_ms}
"#;

/// Redis-backed [`CoordinationStore`].
pub struct RedisStore {
    conn: ConnectionManager,
    token_bucket_script: Script,
    sliding_log_script: Script,
    sliding_counter_script: Script,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, CoordinationError> {
        let client = redis::Client::open(url)
            .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;

        Ok(Self {
            conn,
            token_bucket_script: Script::new(TOKEN_BUCKET_SCRIPT),
            sliding_log_script: Script::new(SLIDING_WINDOW_LOG_SCRIPT),
            sliding_counter_script: Script::new(SLIDING_WINDOW_COUNTER_SCRIPT),
        })
    }
}

fn map_err(e: redis::RedisError) -> CoordinationError {
    if e.is_timeout() {
        CoordinationError::Timeout
    } else if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
        CoordinationError::Unavailable(e.to_string())
    } else {
        CoordinationError::Protocol(e.to_string())
    }
}

#[async_trait]
impl CoordinationStore for RedisStore {
    async fn token_bucket(
        &self,
        key: &str,
        max_tokens: f64,
        refill_per_sec: f64,
        cost: f64,
        now_ms: i64,
        ttl_secs: i64,
    ) -> Result<TokenBucketResult, CoordinationError> {
        let mut conn = self.conn.clone();
        let (allowed, remaining, reset_at_ms): (i64, i64, i64) = self
            .token_bucket_script
            .key(key)
            .arg(max_tokens)
            .arg(refill_per_sec)
            .arg(cost)
            .arg(now_ms)
            .arg(ttl_secs)
            .invoke_async(&mut conn)
            .await
            .map_err(map_err)?;

        Ok(TokenBucketResult {
            allowed: allowed == 1,
            remaining: remaining.max(0) as u64,
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
        ttl_secs: i64,
    ) -> Result<SlidingWindowResult, CoordinationError> {
        let mut conn = self.conn.clone();
        let member = uuid::Uuid::new_v4().to_string();
        let (allowed, remaining, reset_at_ms): (i64, i64, i64) = self
            .sliding_log_script
            .key(key)
            .arg(now_ms)
            .arg(window_ms)
            .arg(limit)
            .arg(cost)
            .arg(ttl_secs)
            .arg(member)
            .invoke_async(&mut conn)
            .await
            .map_err(map_err)?;

        Ok(SlidingWindowResult {
            allowed: allowed == 1,
            remaining: remaining.max(0) as u64,
            reset_at_ms,
        })
    }

    async fn sliding_window_counter(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: i64,
        limit: u64,
        cost: u64,
        ttl_secs: i64,
    ) -> Result<SlidingWindowResult, CoordinationError> {
        let mut conn = self.conn.clone();
        let (allowed, remaining, reset_at_ms): (i64, i64, i64) = self
            .sliding_counter_script
            .key(key)
            .arg(now_ms)
            .arg(window_ms)
            .arg(limit)
            .arg(cost)
            .arg(ttl_secs)
            .invoke_async(&mut conn)
            .await
            .map_err(map_err)?;

        Ok(SlidingWindowResult {
            allowed: allowed == 1,
            remaining: remaining.max(0) as u64,
            reset_at_ms,
        })
    }

    async fn reset(&self, key: &str) -> Result<(), CoordinationError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(map_err)
    }

    async fn ping(&self) -> Result<(), CoordinationError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(map_err)?;
        Ok(())
    }
}
