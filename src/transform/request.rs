//! Request transform (§4.8 request phase).

use std::net::IpAddr;

use http::{HeaderName, HeaderValue};
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::context::Principal;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Runs the full ordered request-phase pipeline against `headers` in place
/// and returns the request ID it settled on (reused or newly minted).
///
/// Idempotent except for request-id minting: calling this twice on the same
/// headers with the id already set reuses it both times (§8, testable
/// property 8).
pub fn apply_request_transform(
    headers: &mut http::HeaderMap,
    security: &SecurityConfig,
    principal: Option<&Principal>,
    client_ip: IpAddr,
    scheme: &str,
    host: &str,
) -> String {
    for (name, value) in &security.request_headers_add {
        let rendered = render_template(value, client_ip);
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name.as_str()), HeaderValue::from_str(&rendered)) {
            headers.insert(name, value);
        }
    }

    for (from, to) in &security.request_headers_rename {
        if let Some(value) = headers.remove(from.as_str()) {
            if let Ok(name) = HeaderName::try_from(to.as_str()) {
                headers.insert(name, value);
            }
        }
    }

    for name in &security.request_headers_remove {
        headers.remove(name.as_str());
    }

    if let Some(principal) = principal {
        insert(headers, "x-user-id", &principal.user_id);
        if let Some(email) = &principal.email {
            insert(headers, "x-user-email", email);
        }
        if !principal.roles.is_empty() {
            insert(headers, "x-user-roles", &principal.roles.join(","));
        }
        insert(headers, "x-user-tier", &format!("{:?}", principal.tier).to_lowercase());
        insert(headers, "x-auth-type", &principal.auth_type);
    }

    let request_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    insert(headers, REQUEST_ID_HEADER, &request_id);

    append_forwarded(headers, client_ip, scheme, host);

    request_id
}

fn append_forwarded(headers: &mut http::HeaderMap, client_ip: IpAddr, scheme: &str, host: &str) {
    append_csv(headers, "x-forwarded-for", &client_ip.to_string());
    insert(headers, "x-forwarded-proto", scheme);
    insert(headers, "x-forwarded-host", host);
    insert(headers, "x-real-ip", &client_ip.to_string());
}

fn append_csv(headers: &mut http::HeaderMap, name: &str, value: &str) {
    let combined = match headers.get(name).and_then(|v| v.to_str().ok()) {
        Some(existing) if existing.split(',').next_back().map(str::trim) == Some(value) => existing.to_string(),
        Some(existing) if !existing.is_empty() => format!("{existing}, {value}"),
        _ => value.to_string(),
    };
    insert(headers, name, &combined);
}

fn insert(headers: &mut http::HeaderMap, name: &str, value: &str) {
    if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::from_str(value)) {
        headers.insert(name, value);
    }
}

fn render_template(value: &str, client_ip: IpAddr) -> String {
    value.replace("{client_ip}", &client_ip.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Tier;
    use http::HeaderMap;

    fn client_ip() -> IpAddr {
        "10.0.0.5".parse().unwrap()
    }

    #[test]
    fn mints_request_id_when_absent() {
        let mut headers = HeaderMap::new();
        let security = SecurityConfig::default();
        let id = apply_request_transform(&mut headers, &security, None, client_ip(), "https", "api.example.com");
        assert_eq!(headers.get(REQUEST_ID_HEADER).unwrap().to_str().unwrap(), id);
    }

    #[test]
    fn reuses_inbound_request_id() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, "abc-123".parse().unwrap());
        let security = SecurityConfig::default();
        let id = apply_request_transform(&mut headers, &security, None, client_ip(), "https", "api.example.com");
        assert_eq!(id, "abc-123");
    }

    #[test]
    fn idempotent_on_second_application() {
        let mut headers = HeaderMap::new();
        let security = SecurityConfig::default();
        let id1 = apply_request_transform(&mut headers, &security, None, client_ip(), "https", "api.example.com");
        let snapshot = headers.clone();
        let id2 = apply_request_transform(&mut headers, &security, None, client_ip(), "https", "api.example.com");
        assert_eq!(id1, id2);
        assert_eq!(snapshot, headers);
    }

    #[test]
    fn injects_principal_headers() {
        let mut headers = HeaderMap::new();
        let security = SecurityConfig::default();
        let principal = Principal {
            user_id: "u1".into(),
            email: Some("u1@example.com".into()),
            roles: vec!["admin".into()],
            tier: Tier::Pro,
            auth_type: "bearer".into(),
        };
        apply_request_transform(&mut headers, &security, Some(&principal), client_ip(), "https", "api.example.com");
        assert_eq!(headers.get("x-user-id").unwrap(), "u1");
        assert_eq!(headers.get("x-user-tier").unwrap(), "pro");
    }
}
