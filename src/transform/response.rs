//! Response transform (§4.8 response phase).

use http::{HeaderName, HeaderValue};

use crate::config::SecurityConfig;

/// Server-tech leakage, internal-routing leakage, and duplicated auth tokens
/// an upstream echoed back (§4.8, §8 testable property 7: "no response
/// leaving the gateway contains any header in the sensitive-header set").
const SENSITIVE_RESPONSE_HEADERS: &[&str] = &[
    "server",
    "x-powered-by",
    "x-aspnet-version",
    "x-aspnetmvc-version",
    "via",
    "x-backend-server",
    "x-upstream",
    "x-internal-route",
    "x-runtime",
    "x-envoy-upstream-service-time",
    "www-authenticate",
];

const BASELINE_SECURITY_HEADERS: &[(&str, &str)] = &[
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
];

/// Runs the full ordered response-phase pipeline against `headers` in place.
pub fn apply_response_transform(headers: &mut http::HeaderMap, security: &SecurityConfig) {
    for name in SENSITIVE_RESPONSE_HEADERS {
        headers.remove(*name);
    }
    for name in &security.response_headers_remove {
        headers.remove(name.as_str());
    }

    for (from, to) in &security.response_headers_rename {
        if let Some(value) = headers.remove(from.as_str()) {
            if let Ok(name) = HeaderName::try_from(to.as_str()) {
                headers.insert(name, value);
            }
        }
    }

    for (name, value) in &security.response_headers_add {
        insert(headers, name, value);
    }

    for (name, value) in BASELINE_SECURITY_HEADERS {
        if !headers.contains_key(*name) {
            insert(headers, name, value);
        }
    }
}

fn insert(headers: &mut http::HeaderMap, name: &str, value: &str) {
    if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::from_str(value)) {
        headers.insert(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;

    #[test]
    fn strips_sensitive_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("server", "nginx/1.2".parse().unwrap());
        headers.insert("x-powered-by", "Express".parse().unwrap());
        apply_response_transform(&mut headers, &SecurityConfig::default());
        assert!(!headers.contains_key("server"));
        assert!(!headers.contains_key("x-powered-by"));
    }

    #[test]
    fn adds_baseline_security_headers_when_absent() {
        let mut headers = HeaderMap::new();
        apply_response_transform(&mut headers, &SecurityConfig::default());
        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    }

    #[test]
    fn preserves_upstream_security_header_override() {
        let mut headers = HeaderMap::new();
        headers.insert("x-frame-options", "SAMEORIGIN".parse().unwrap());
        apply_response_transform(&mut headers, &SecurityConfig::default());
        assert_eq!(headers.get("x-frame-options").unwrap(), "SAMEORIGIN");
    }
}
