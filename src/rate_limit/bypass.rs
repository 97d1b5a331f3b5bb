//! Bypass evaluator (C4): short-circuits the rate limiter entirely for
//! whitelisted IPs, principals, API keys, and paths.

use ipnet::IpNet;

use crate::config::BypassConfig;
use crate::context::RequestContext;

use super::key::hash_api_key;

/// Header a trusted internal caller sets to skip rate limiting outright
/// (§4.4: "internal=true and request carries an internal marker").
pub const INTERNAL_MARKER_HEADER: &str = "x-gateway-internal";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BypassDecision {
    pub bypass: bool,
    pub reason: Option<&'static str>,
}

impl BypassDecision {
    fn no() -> Self {
        Self { bypass: false, reason: None }
    }

    fn yes(reason: &'static str) -> Self {
        Self { bypass: true, reason: Some(reason) }
    }
}

/// `check(context) -> {bypass, reason}` (§4.4). Sources are checked in the
/// order the spec lists them; the first match wins.
pub fn check(config: &BypassConfig, ctx: &RequestContext) -> BypassDecision {
    if config.ips.iter().any(|entry| ip_matches(entry, ctx)) {
        return BypassDecision::yes("ip-whitelist");
    }

    if let Some(user_id) = ctx.user_id() {
        if config.user_ids.iter().any(|id| id == user_id) {
            return BypassDecision::yes("user-whitelist");
        }
    }

    if let Some(api_key) = &ctx.api_key {
        let hashed = hash_api_key(api_key);
        if config.api_key_hashes.iter().any(|h| h == &hashed) {
            return BypassDecision::yes("api-key-whitelist");
        }
    }

    if config.paths.iter().any(|p| p == &ctx.path) {
        return BypassDecision::yes("path-whitelist");
    }

    if ctx
        .headers
        .get(INTERNAL_MARKER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
    {
        return BypassDecision::yes("internal-marker");
    }

    BypassDecision::no()
}

fn ip_matches(entry: &str, ctx: &RequestContext) -> bool {
    if let Ok(net) = entry.parse::<IpNet>() {
        return net.contains(&ctx.client_ip);
    }
    entry == ctx.client_ip.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Method};
    use std::net::IpAddr;
    use std::time::Instant;

    fn ctx(ip: &str) -> RequestContext {
        RequestContext {
            request_id: "r1".into(),
            client_ip: ip.parse::<IpAddr>().unwrap(),
            method: Method::GET,
            path: "/api/x".into(),
            headers: HeaderMap::new(),
            principal: None,
            api_key: None,
            started_at: Instant::now(),
            rate_limit: None,
        }
    }

    #[test]
    fn exact_ip_bypasses() {
        let config = BypassConfig { ips: vec!["10.0.0.5".into()], ..Default::default() };
        let decision = check(&config, &ctx("10.0.0.5"));
        assert!(decision.bypass);
        assert_eq!(decision.reason, Some("ip-whitelist"));
    }

    #[test]
    fn cidr_ip_bypasses() {
        let config = BypassConfig { ips: vec!["10.0.0.0/24".into()], ..Default::default() };
        let decision = check(&config, &ctx("10.0.0.200"));
        assert!(decision.bypass);
    }

    #[test]
    fn unmatched_request_is_not_bypassed() {
        let config = BypassConfig::default();
        assert!(!check(&config, &ctx("10.0.0.5")).bypass);
    }
}
