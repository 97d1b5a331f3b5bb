//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits so the document can be loaded as TOML,
//! YAML, or JSON (§6: "A YAML or JSON document whose shape is defined in
//! §3").

use crate::context::Tier;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration for the reverse proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Route definitions mapping requests to backends.
    pub routes: Vec<RouteConfig>,

    /// Backend server definitions.
    pub backends: Vec<BackendConfig>,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Circuit breaker configuration.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Shared coordination store connection settings.
    pub coordination: CoordinationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,

    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            max_connections: 10_000,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// How a route's pattern is interpreted (§3: RouteEntry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Exact,
    Prefix,
    Glob,
    Regex,
}

impl Default for PatternKind {
    fn default() -> Self {
        PatternKind::Prefix
    }
}

/// Route configuration mapping a path pattern to a backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Optional host header to match (exact, case-insensitive).
    pub host: Option<String>,

    /// Pattern evaluated against the request path.
    pub pattern: String,

    #[serde(default)]
    pub pattern_kind: PatternKind,

    /// Backend name to forward to.
    pub backend: String,
}

/// A single configured upstream (§3: Backend).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Unique backend identifier.
    pub name: String,

    /// scheme://host:port
    pub url: String,

    /// Weight, reserved for weighted selection among equally-specific
    /// candidates.
    #[serde(default = "default_weight")]
    pub weight: u32,

    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub retries: Option<u32>,

    /// Maximum concurrent connections to this backend.
    #[serde(default = "default_max_backend_conns")]
    pub max_connections: usize,

    /// Per-backend health-check overrides (§3: Backend's embedded
    /// `healthCheckSpec`). Any field left unset falls back to the global
    /// `HealthCheckConfig`.
    #[serde(default)]
    pub health_check: Option<BackendHealthCheckOverride>,
}

fn default_weight() -> u32 {
    1
}

fn default_max_backend_conns() -> usize {
    100
}

/// Per-backend override of the global health-check settings. Every field is
/// optional; unset fields fall back to the matching `HealthCheckConfig`
/// field (§3, §4.6).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BackendHealthCheckOverride {
    pub interval_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub path: Option<String>,
    pub unhealthy_threshold: Option<u32>,
    pub healthy_threshold: Option<u32>,
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Health check timeout in seconds.
    pub timeout_secs: u64,

    /// Path to probe for HTTP health checks.
    pub path: String,

    /// Number of consecutive failures before marking unhealthy.
    pub unhealthy_threshold: u32,

    /// Number of consecutive successes before marking healthy.
    pub healthy_threshold: u32,
}

impl HealthCheckConfig {
    /// Resolve this global config merged with a backend's optional override,
    /// one field at a time.
    pub fn merged_with(&self, override_: Option<&BackendHealthCheckOverride>) -> Self {
        let Some(o) = override_ else { return self.clone() };
        Self {
            enabled: self.enabled,
            interval_secs: o.interval_secs.unwrap_or(self.interval_secs),
            timeout_secs: o.timeout_secs.unwrap_or(self.timeout_secs),
            path: o.path.clone().unwrap_or_else(|| self.path.clone()),
            unhealthy_threshold: o.unhealthy_threshold.unwrap_or(self.unhealthy_threshold),
            healthy_threshold: o.healthy_threshold.unwrap_or(self.healthy_threshold),
        }
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            timeout_secs: 5,
            path: "/health".to_string(),
            unhealthy_threshold: 3,
            healthy_threshold: 2,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Idle connection timeout in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            idle_secs: 60,
        }
    }
}

/// Rate-limit algorithm selector (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitAlgorithm {
    TokenBucket,
    SlidingWindowLog,
    SlidingWindowCounter,
}

/// Strategy for deriving the rate-limit key from a request context (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyStrategy {
    Ip,
    User,
    ApiKey,
    IpEndpoint,
    UserEndpoint,
    Composite,
}

impl Default for KeyStrategy {
    fn default() -> Self {
        KeyStrategy::Ip
    }
}

/// How an endpoint pattern in a rate-limit rule is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointMatchType {
    Exact,
    Glob,
}

impl Default for EndpointMatchType {
    fn default() -> Self {
        EndpointMatchType::Glob
    }
}

/// Match predicate for a rate-limit rule.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RuleMatch {
    pub endpoint: Option<String>,
    pub endpoint_match_type: EndpointMatchType,
    pub methods: Option<Vec<String>>,
    pub tiers: Option<Vec<Tier>>,
    pub user_ids: Option<Vec<String>>,
    pub ips: Option<Vec<String>>,
    pub api_keys: Option<Vec<String>>,
    pub required_headers: Option<HashMap<String, String>>,
}

/// Limit spec for a matched rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitSpec {
    pub algorithm: RateLimitAlgorithm,
    pub requests: u64,
    pub window_seconds: u64,
    pub burst: Option<u64>,
}

fn default_priority_true() -> bool {
    true
}

/// A single rate-limit rule. At most one applies per request.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitRuleConfig {
    pub id: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default = "default_priority_true")]
    pub enabled: bool,
    #[serde(rename = "match", default)]
    pub match_: RuleMatch,
    pub rate_limit: LimitSpec,
    #[serde(default)]
    pub key_strategy: KeyStrategy,
}

/// Default limits applied per tier when no rule matches.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TierDefault {
    pub tier: Tier,
    pub requests: u64,
    pub window_seconds: u64,
    pub burst: Option<u64>,
}

/// Rate limiting configuration: rules, tier defaults, bypass list.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub default_algorithm: RateLimitAlgorithm,
    pub rules: Vec<RateLimitRuleConfig>,
    pub tier_defaults: Vec<TierDefault>,
    /// Fallback when no tier default is configured either.
    pub global_default_requests: u64,
    pub global_default_window_seconds: u64,
    pub bypass: BypassConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_algorithm: RateLimitAlgorithm::TokenBucket,
            rules: Vec::new(),
            tier_defaults: Vec::new(),
            global_default_requests: 100,
            global_default_window_seconds: 60,
            bypass: BypassConfig::default(),
        }
    }
}

/// Bypass whitelist configuration (C4).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BypassConfig {
    pub ips: Vec<String>,
    pub user_ids: Vec<String>,
    pub api_key_hashes: Vec<String>,
    pub paths: Vec<String>,
}

/// How the circuit breaker decides to trip while closed (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakerMode {
    Consecutive,
    Windowed,
}

/// Circuit breaker configuration (C6).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,
    pub mode: BreakerMode,
    pub failure_threshold: u32,
    pub minimum_request_threshold: u32,
    pub failure_rate_threshold: f64,
    pub failure_window_ms: u64,
    pub reset_timeout_ms: u64,
    pub success_threshold: u32,
    pub outcome_ring_size: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: BreakerMode::Consecutive,
            failure_threshold: 5,
            minimum_request_threshold: 10,
            failure_rate_threshold: 50.0,
            failure_window_ms: 60_000,
            reset_timeout_ms: 10_000,
            success_threshold: 2,
            outcome_ring_size: 64,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of retry attempts.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Whether a 5xx upstream response is retryable.
    pub retry_on_5xx: bool,

    /// Percentage of requests that can be retries (retry budget).
    /// e.g., 0.1 for 10% budget.
    pub budget_ratio: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 30_000,
            retry_on_5xx: true,
            budget_ratio: 0.1,
        }
    }
}

/// Connection settings for the external coordination store (C1).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CoordinationConfig {
    pub url: String,
    pub key_prefix: String,
    pub pool_size: usize,
    pub command_timeout_ms: u64,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "gatecore:rl:".to_string(),
            pool_size: 8,
            command_timeout_ms: 50,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin/introspection surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin router.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin dashboard bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Security hardening and header transform configuration (C8).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,

    /// CIDR/IP list trusted to supply X-Forwarded-* headers.
    pub trusted_proxies: Vec<String>,

    pub request_headers_add: HashMap<String, String>,
    pub request_headers_rename: HashMap<String, String>,
    pub request_headers_remove: Vec<String>,

    pub response_headers_add: HashMap<String, String>,
    pub response_headers_rename: HashMap<String, String>,
    pub response_headers_remove: Vec<String>,

    /// Redact error internals (stack traces, upstream diagnostics) in
    /// production responses and logs.
    pub redact_errors: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 10 * 1024 * 1024,
            trusted_proxies: Vec::new(),
            request_headers_add: HashMap::new(),
            request_headers_rename: HashMap::new(),
            request_headers_remove: Vec::new(),
            response_headers_add: HashMap::new(),
            response_headers_rename: HashMap::new(),
            response_headers_remove: Vec::new(),
            redact_errors: true,
        }
    }
}
