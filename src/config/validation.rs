//! Configuration validation logic.

use crate::config::schema::{BreakerMode, ProxyConfig};
use std::collections::HashSet;

/// Error type for configuration validation failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation error: {}", self.0)
    }
}

/// Validate a ProxyConfig for semantic correctness.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // 1. Referential integrity: routes must point to existing backends.
    let backend_names: HashSet<&str> = config.backends.iter().map(|b| b.name.as_str()).collect();
    for route in &config.routes {
        if !backend_names.contains(route.backend.as_str()) {
            errors.push(ValidationError(format!(
                "Route '{}' references unknown backend '{}'",
                route.name, route.backend
            )));
        }
    }

    // 2. Backend names must be unique.
    let mut seen = HashSet::new();
    for backend in &config.backends {
        if !seen.insert(backend.name.as_str()) {
            errors.push(ValidationError(format!(
                "Duplicate backend name '{}'",
                backend.name
            )));
        }
        if url::Url::parse(&backend.url).is_err() {
            errors.push(ValidationError(format!(
                "Backend '{}' has an invalid url '{}'",
                backend.name, backend.url
            )));
        }
    }

    // 3. Health check thresholds.
    if config.health_check.healthy_threshold == 0 {
        errors.push(ValidationError(
            "health_check.healthy_threshold must be > 0".to_string(),
        ));
    }
    if config.health_check.unhealthy_threshold == 0 {
        errors.push(ValidationError(
            "health_check.unhealthy_threshold must be > 0".to_string(),
        ));
    }

    // 4. Retry budget.
    if config.retries.budget_ratio < 0.0 || config.retries.budget_ratio > 1.0 {
        errors.push(ValidationError(
            "retries.budget_ratio must be between 0.0 and 1.0".to_string(),
        ));
    }

    // 5. Circuit breaker thresholds.
    if config.circuit_breaker.success_threshold == 0 {
        errors.push(ValidationError(
            "circuit_breaker.success_threshold must be > 0".to_string(),
        ));
    }
    if config.circuit_breaker.mode == BreakerMode::Consecutive
        && config.circuit_breaker.failure_threshold == 0
    {
        errors.push(ValidationError(
            "circuit_breaker.failure_threshold must be > 0 in consecutive mode".to_string(),
        ));
    }
    if config.circuit_breaker.mode == BreakerMode::Windowed
        && !(0.0..=100.0).contains(&config.circuit_breaker.failure_rate_threshold)
    {
        errors.push(ValidationError(
            "circuit_breaker.failure_rate_threshold must be between 0 and 100".to_string(),
        ));
    }

    // 6. Rate-limit rules reference valid windows.
    for rule in &config.rate_limit.rules {
        if rule.rate_limit.window_seconds == 0 {
            errors.push(ValidationError(format!(
                "Rate-limit rule '{}' has a zero window_seconds",
                rule.id
            )));
        }
        if rule.rate_limit.requests == 0 {
            errors.push(ValidationError(format!(
                "Rate-limit rule '{}' has a zero requests limit",
                rule.id
            )));
        }
    }

    // 7. Timeouts (warning only, not fatal).
    if config.timeouts.connect_secs == 0 && config.timeouts.request_secs == 0 {
        tracing::warn!("Timeouts are set to 0, matching requests might time out immediately");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::*;

    fn backend(name: &str) -> BackendConfig {
        BackendConfig {
            name: name.into(),
            url: "http://127.0.0.1:8080".into(),
            weight: 1,
            timeout_secs: None,
            retries: None,
            max_connections: 100,
            health_check: None,
        }
    }

    fn route(name: &str, backend: &str) -> RouteConfig {
        RouteConfig {
            name: name.into(),
            host: None,
            pattern: "/".into(),
            pattern_kind: PatternKind::Prefix,
            backend: backend.into(),
        }
    }

    #[test]
    fn test_valid_config() {
        let mut config = ProxyConfig::default();
        config.backends.push(backend("b1"));
        config.routes.push(route("r1", "b1"));

        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_backend_reference() {
        let mut config = ProxyConfig::default();
        config.routes.push(route("r1", "missing"));

        let errs = validate_config(&config).unwrap_err();
        assert!(errs.iter().any(|e| e.0.contains("unknown backend 'missing'")));
    }

    #[test]
    fn test_duplicate_backend_name() {
        let mut config = ProxyConfig::default();
        config.backends.push(backend("b1"));
        config.backends.push(backend("b1"));

        let errs = validate_config(&config).unwrap_err();
        assert!(errs.iter().any(|e| e.0.contains("Duplicate backend name")));
    }

    #[test]
    fn test_invalid_rate_limit_rule() {
        let mut config = ProxyConfig::default();
        config.rate_limit.rules.push(RateLimitRuleConfig {
            id: "r1".into(),
            priority: 0,
            enabled: true,
            match_: RuleMatch::default(),
            rate_limit: LimitSpec {
                algorithm: RateLimitAlgorithm::TokenBucket,
                requests: 0,
                window_seconds: 60,
                burst: None,
            },
            key_strategy: KeyStrategy::Ip,
        });

        let errs = validate_config(&config).unwrap_err();
        assert!(errs.iter().any(|e| e.0.contains("zero requests limit")));
    }
}
