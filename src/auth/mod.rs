//! Principal resolution.
//!
//! Authentication/RBAC verification is named out of scope (§1: "interfaces
//! only") — the core consumes a principal record, it doesn't produce one.
//! This module is the narrow interface boundary: it trusts that an upstream
//! collaborator (an auth proxy, an IdP-aware ingress) has already verified
//! the caller and attached `x-user-*` headers before the request reaches
//! this process, the same shape `security::access_control` used for its
//! wallet-identity variant. Called once, at the very start of the request
//! pipeline, ahead of rate limiting (§9 open question: "implementations
//! should explicitly order auth before rate-limit and document it").

use http::HeaderMap;

use crate::context::{Principal, Tier};

const USER_ID_HEADER: &str = "x-user-id";
const USER_EMAIL_HEADER: &str = "x-user-email";
const USER_ROLES_HEADER: &str = "x-user-roles";
const USER_TIER_HEADER: &str = "x-user-tier";
const AUTH_TYPE_HEADER: &str = "x-auth-type";

/// Resolve a principal from already-validated trust headers, if present.
/// Absence of `x-user-id` means anonymous, not an error — callers fall back
/// to IP-keyed rate limiting and the anonymous tier.
pub fn resolve_principal(headers: &HeaderMap) -> Option<Principal> {
    let user_id = header_str(headers, USER_ID_HEADER)?.to_string();
    let email = header_str(headers, USER_EMAIL_HEADER).map(str::to_string);
    let roles = header_str(headers, USER_ROLES_HEADER)
        .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    let tier = header_str(headers, USER_TIER_HEADER).map(parse_tier).unwrap_or(Tier::Anonymous);
    let auth_type = header_str(headers, AUTH_TYPE_HEADER).unwrap_or("trusted-header").to_string();

    Some(Principal { user_id, email, roles, tier, auth_type })
}

/// Extract a raw API key from `Authorization: Bearer <key>` or `x-api-key`,
/// for rate-limit key derivation (C3) and bypass checks (C4) independent of
/// whether a principal was resolved.
pub fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = header_str(headers, "authorization") {
        if let Some(key) = auth.strip_prefix("Bearer ").or_else(|| auth.strip_prefix("bearer ")) {
            if !key.is_empty() {
                return Some(key.to_string());
            }
        }
    }
    header_str(headers, "x-api-key").map(str::to_string)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).filter(|v| !v.is_empty())
}

fn parse_tier(value: &str) -> Tier {
    match value.to_ascii_lowercase().as_str() {
        "free" => Tier::Free,
        "basic" => Tier::Basic,
        "pro" => Tier::Pro,
        "enterprise" => Tier::Enterprise,
        "unlimited" => Tier::Unlimited,
        _ => Tier::Anonymous,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (k, v) in pairs {
            headers.insert(http::HeaderName::try_from(*k).unwrap(), v.parse().unwrap());
        }
        headers
    }

    #[test]
    fn absent_user_id_resolves_to_no_principal() {
        assert!(resolve_principal(&HeaderMap::new()).is_none());
    }

    #[test]
    fn resolves_principal_from_trust_headers() {
        let h = headers(&[
            ("x-user-id", "u1"),
            ("x-user-tier", "pro"),
            ("x-user-roles", "admin, billing"),
        ]);
        let principal = resolve_principal(&h).unwrap();
        assert_eq!(principal.user_id, "u1");
        assert_eq!(principal.tier, Tier::Pro);
        assert_eq!(principal.roles, vec!["admin", "billing"]);
    }

    #[test]
    fn extracts_bearer_api_key() {
        let h = headers(&[("authorization", "Bearer secret-key")]);
        assert_eq!(extract_api_key(&h), Some("secret-key".to_string()));
    }

    #[test]
    fn extracts_api_key_header_fallback() {
        let h = headers(&[("x-api-key", "secret-key")]);
        assert_eq!(extract_api_key(&h), Some("secret-key".to_string()));
    }
}
