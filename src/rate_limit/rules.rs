//! Rule matcher (C3): selects the highest-priority rate-limit rule (or a
//! synthetic tier/global default) for a request context.

use crate::config::{EndpointMatchType, KeyStrategy, RateLimitAlgorithm, RateLimitConfig, RateLimitRuleConfig};
use crate::context::{RequestContext, Tier};
use crate::routing::pattern::matches_glob;

use super::key::hash_api_key;

/// The limit spec selected for this request, whatever its source.
#[derive(Debug, Clone)]
pub struct MatchedRule {
    /// `rule:<id>`, `tier-default`, or `global-default` — carried into the
    /// observation event for diagnosability.
    pub source: String,
    pub algorithm: RateLimitAlgorithm,
    pub requests: u64,
    pub window_seconds: u64,
    pub burst: Option<u64>,
    pub key_strategy: KeyStrategy,
}

/// `match(context) -> MatchedRule` (§4.3).
pub fn match_rule(config: &RateLimitConfig, ctx: &RequestContext) -> MatchedRule {
    let mut candidates: Vec<&RateLimitRuleConfig> = config.rules.iter().filter(|r| r.enabled).collect();
    candidates.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));

    for rule in candidates {
        if rule_matches(rule, ctx) {
            return MatchedRule {
                source: format!("rule:{}", rule.id),
                algorithm: rule.rate_limit.algorithm,
                requests: rule.rate_limit.requests,
                window_seconds: rule.rate_limit.window_seconds,
                burst: rule.rate_limit.burst,
                key_strategy: rule.key_strategy,
            };
        }
    }

    let tier = ctx.tier();
    if let Some(default) = config.tier_defaults.iter().find(|t| t.tier == tier) {
        return MatchedRule {
            source: "tier-default".into(),
            algorithm: config.default_algorithm,
            requests: default.requests,
            window_seconds: default.window_seconds,
            burst: default.burst,
            key_strategy: default_key_strategy(tier),
        };
    }

    MatchedRule {
        source: "global-default".into(),
        algorithm: config.default_algorithm,
        requests: config.global_default_requests,
        window_seconds: config.global_default_window_seconds,
        burst: None,
        key_strategy: default_key_strategy(tier),
    }
}

fn default_key_strategy(tier: Tier) -> KeyStrategy {
    if tier == Tier::Anonymous {
        KeyStrategy::Ip
    } else {
        KeyStrategy::User
    }
}

fn rule_matches(rule: &RateLimitRuleConfig, ctx: &RequestContext) -> bool {
    let m = &rule.match_;

    if let Some(endpoint) = &m.endpoint {
        let matched = match m.endpoint_match_type {
            EndpointMatchType::Exact => endpoint == &ctx.path,
            EndpointMatchType::Glob => matches_glob(endpoint, &ctx.path),
        };
        if !matched {
            return false;
        }
    }

    if let Some(methods) = &m.methods {
        if !methods.iter().any(|meth| meth.eq_ignore_ascii_case(ctx.method.as_str())) {
            return false;
        }
    }

    if let Some(tiers) = &m.tiers {
        if !tiers.contains(&ctx.tier()) {
            return false;
        }
    }

    if let Some(user_ids) = &m.user_ids {
        match ctx.user_id() {
            Some(id) if user_ids.iter().any(|u| u == id) => {}
            _ => return false,
        }
    }

    if let Some(ips) = &m.ips {
        if !ips.iter().any(|ip| ip == &ctx.client_ip.to_string()) {
            return false;
        }
    }

    if let Some(api_keys) = &m.api_keys {
        match &ctx.api_key {
            Some(key) => {
                let hashed = hash_api_key(key);
                if !api_keys.iter().any(|k| k == &hashed || k == key) {
                    return false;
                }
            }
            None => return false,
        }
    }

    if let Some(required_headers) = &m.required_headers {
        for (name, value) in required_headers {
            let header_value = ctx
                .headers
                .get(name.as_str())
                .and_then(|v| v.to_str().ok());
            if header_value != Some(value.as_str()) {
                return false;
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LimitSpec, RuleMatch};
    use http::{HeaderMap, Method};
    use std::net::IpAddr;
    use std::time::Instant;

    fn ctx(path: &str) -> RequestContext {
        RequestContext {
            request_id: "r1".into(),
            client_ip: "10.0.0.1".parse::<IpAddr>().unwrap(),
            method: Method::GET,
            path: path.into(),
            headers: HeaderMap::new(),
            principal: None,
            api_key: None,
            started_at: Instant::now(),
            rate_limit: None,
        }
    }

    #[test]
    fn no_rule_matches_falls_back_to_global_default() {
        let config = RateLimitConfig::default();
        let matched = match_rule(&config, &ctx("/anything"));
        assert_eq!(matched.source, "global-default");
        assert_eq!(matched.requests, config.global_default_requests);
    }

    #[test]
    fn highest_priority_matching_rule_wins() {
        let mut config = RateLimitConfig::default();
        config.rules.push(RateLimitRuleConfig {
            id: "low".into(),
            priority: 1,
            enabled: true,
            match_: RuleMatch { endpoint: Some("/api/**".into()), endpoint_match_type: EndpointMatchType::Glob, ..Default::default() },
            rate_limit: LimitSpec { algorithm: RateLimitAlgorithm::TokenBucket, requests: 10, window_seconds: 60, burst: None },
            key_strategy: KeyStrategy::Ip,
        });
        config.rules.push(RateLimitRuleConfig {
            id: "high".into(),
            priority: 10,
            enabled: true,
            match_: RuleMatch { endpoint: Some("/api/**".into()), endpoint_match_type: EndpointMatchType::Glob, ..Default::default() },
            rate_limit: LimitSpec { algorithm: RateLimitAlgorithm::TokenBucket, requests: 2, window_seconds: 60, burst: None },
            key_strategy: KeyStrategy::Ip,
        });

        let matched = match_rule(&config, &ctx("/api/x"));
        assert_eq!(matched.source, "rule:high");
        assert_eq!(matched.requests, 2);
    }
}
