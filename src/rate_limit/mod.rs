//! Distributed rate limiting: rule matching (C3), bypass (C4), and the
//! three-algorithm engine (C2) over the shared coordination store (C1).
//!
//! # Data Flow
//! ```text
//! RequestContext
//!     → bypass::check        (C4, short-circuits on whitelist hit)
//!     → rules::match_rule     (C3, selects rule / tier default / global default)
//!     → key::derive_key       (C3, orthogonal to rule selection)
//!     → engine::RateLimitEngine::check (C2, atomic round trip to C1)
//! ```

pub mod bypass;
pub mod engine;
pub mod key;
pub mod rules;

pub use bypass::BypassDecision;
pub use engine::{CheckResult, RateLimitEngine};
pub use rules::MatchedRule;

use crate::config::RateLimitConfig;
use crate::context::RequestContext;

/// Full C4→C3→C2 admission decision for one request.
#[derive(Debug, Clone)]
pub enum AdmissionDecision {
    Bypassed { reason: &'static str },
    Checked(CheckResult),
}

/// Runs the bypass check and, if not bypassed, the rule match + engine
/// check. Skips C2 entirely on bypass (§4.4).
pub async fn admit(
    rate_limit_config: &RateLimitConfig,
    engine: &RateLimitEngine,
    ctx: &RequestContext,
) -> AdmissionDecision {
    if !rate_limit_config.enabled {
        return AdmissionDecision::Checked(CheckResult {
            allowed: true,
            limit: 0,
            remaining: 0,
            reset_at: 0,
            retry_after: None,
            algorithm: "disabled",
            coordination_failed: false,
        });
    }

    let decision = bypass::check(&rate_limit_config.bypass, ctx);
    if decision.bypass {
        return AdmissionDecision::Bypassed { reason: decision.reason.unwrap_or("bypass") };
    }

    let matched = rules::match_rule(rate_limit_config, ctx);
    let rl_key = key::derive_key(matched.key_strategy, ctx);
    let result = engine.check(&matched, &rl_key, 1).await;

    AdmissionDecision::Checked(result)
}
