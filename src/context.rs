//! Per-request context value object.
//!
//! Per the design notes, request-scoped facts (principal, request id,
//! rate-limit outcome) are carried alongside the request rather than stuffed
//! into extensions on the raw `http::Request`. The raw request is never
//! mutated beyond header edits performed by the transform pipeline.

use std::net::IpAddr;
use std::time::Instant;

use http::{HeaderMap, Method};

/// Coarse classification of a principal, selecting default rate limits when
/// no rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Anonymous,
    Free,
    Basic,
    Pro,
    Enterprise,
    Unlimited,
}

impl Default for Tier {
    fn default() -> Self {
        Tier::Anonymous
    }
}

/// Principal attached by the (external) authentication collaborator.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: String,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub tier: Tier,
    pub auth_type: String,
}

/// Outcome of the rate-limit admission step, carried for observation.
#[derive(Debug, Clone)]
pub struct RateLimitOutcome {
    pub allowed: bool,
    pub bypassed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at: u64,
    pub algorithm: Option<&'static str>,
}

/// Per-request context threaded through the admission pipeline.
///
/// Built once at request start from the inbound request and the (possibly
/// absent) principal, and read/extended by every subsequent component.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub client_ip: IpAddr,
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub principal: Option<Principal>,
    pub api_key: Option<String>,
    pub started_at: Instant,
    pub rate_limit: Option<RateLimitOutcome>,
}

impl RequestContext {
    pub fn tier(&self) -> Tier {
        self.principal.as_ref().map(|p| p.tier).unwrap_or(Tier::Anonymous)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.principal.as_ref().map(|p| p.user_id.as_str())
    }
}
