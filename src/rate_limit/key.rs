//! Rate-limit key derivation (§4.3), orthogonal to rule selection.

use sha2::{Digest, Sha256};

use crate::config::KeyStrategy;
use crate::context::RequestContext;

/// Derive the coordination-store key suffix for `ctx` under `strategy`.
/// Callers prefix this with the configured `key_prefix` before touching C1.
pub fn derive_key(strategy: KeyStrategy, ctx: &RequestContext) -> String {
    match strategy {
        KeyStrategy::Ip => format!("ip:{}", ctx.client_ip),
        KeyStrategy::User => match ctx.user_id() {
            Some(id) => format!("user:{id}"),
            None => format!("ip:{}", ctx.client_ip),
        },
        KeyStrategy::ApiKey => match &ctx.api_key {
            Some(k) => format!("key:{}", hash_api_key(k)),
            None => format!("ip:{}", ctx.client_ip),
        },
        KeyStrategy::IpEndpoint => format!("ip:{}:ep:{}", ctx.client_ip, ctx.path),
        KeyStrategy::UserEndpoint => match ctx.user_id() {
            Some(id) => format!("user:{id}:ep:{}", ctx.path),
            None => format!("ip:{}:ep:{}", ctx.client_ip, ctx.path),
        },
        KeyStrategy::Composite => {
            let principal = ctx
                .user_id()
                .map(|id| format!("user:{id}"))
                .unwrap_or_else(|| format!("ip:{}", ctx.client_ip));
            format!("{principal}:ep:{}:m:{}", ctx.path, ctx.method)
        }
    }
}

/// API keys are hashed before they ever reach the coordination store or a
/// bypass-list comparison, so a log or key dump never discloses the secret.
pub fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Principal, RequestContext, Tier};
    use http::{HeaderMap, Method};
    use std::net::IpAddr;
    use std::time::Instant;

    fn ctx(user: Option<&str>) -> RequestContext {
        RequestContext {
            request_id: "r1".into(),
            client_ip: "10.0.0.1".parse::<IpAddr>().unwrap(),
            method: Method::GET,
            path: "/api/x".into(),
            headers: HeaderMap::new(),
            principal: user.map(|u| Principal {
                user_id: u.into(),
                email: None,
                roles: vec![],
                tier: Tier::Free,
                auth_type: "bearer".into(),
            }),
            api_key: None,
            started_at: Instant::now(),
            rate_limit: None,
        }
    }

    #[test]
    fn user_strategy_falls_back_to_ip_when_anonymous() {
        let c = ctx(None);
        assert_eq!(derive_key(KeyStrategy::User, &c), "ip:10.0.0.1");
    }

    #[test]
    fn user_strategy_uses_user_id_when_present() {
        let c = ctx(Some("u42"));
        assert_eq!(derive_key(KeyStrategy::User, &c), "user:u42");
    }

    #[test]
    fn composite_key_includes_endpoint_and_method() {
        let c = ctx(Some("u42"));
        assert_eq!(derive_key(KeyStrategy::Composite, &c), "user:u42:ep:/api/x:m:GET");
    }
}
