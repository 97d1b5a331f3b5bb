//! Route lookup (C7).
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks); a reload
//!   builds a whole new `Router` and swaps the config snapshot, per §5.
//! - Candidates are returned in specificity order, most specific first, so
//!   the executor can walk them for failover (§4.5).
//! - Backend names repeat only once even if several overlapping route
//!   patterns point at the same backend.

use crate::config::RouteConfig;

use super::matcher::{CompiledRoute, Matcher};

/// Immutable, compiled set of routes.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<CompiledRoute>,
}

impl Router {
    /// Compile every route in `configs`, sorted by specificity (most
    /// specific first). Invalid regex patterns are rejected here so a bad
    /// reload never reaches live traffic.
    pub fn from_config(configs: &[RouteConfig]) -> Result<Self, String> {
        let mut routes = configs
            .iter()
            .map(CompiledRoute::compile)
            .collect::<Result<Vec<_>, _>>()?;

        routes.sort_by(|a, b| b.specificity.cmp(&a.specificity).then_with(|| a.name.cmp(&b.name)));

        Ok(Self { routes })
    }

    /// Resolve `path` (optionally scoped by `host`) to an ordered list of
    /// candidate backend names, most specific match first (§4.5). Empty
    /// means no route matched.
    pub fn resolve(&self, host: Option<&str>, path: &str) -> Vec<String> {
        let mut candidates = Vec::new();
        for route in &self.routes {
            if Matcher::matches(route, host, path) && !candidates.contains(&route.backend) {
                candidates.push(route.backend.clone());
            }
        }
        candidates
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PatternKind;

    fn route(name: &str, pattern: &str, kind: PatternKind, backend: &str) -> RouteConfig {
        RouteConfig {
            name: name.into(),
            host: None,
            pattern: pattern.into(),
            pattern_kind: kind,
            backend: backend.into(),
        }
    }

    #[test]
    fn resolves_to_most_specific_route_first() {
        let router = Router::from_config(&[
            route("r1", "/api", PatternKind::Prefix, "b1"),
            route("r2", "/api/users", PatternKind::Prefix, "b2"),
        ])
        .unwrap();

        let candidates = router.resolve(None, "/api/users/42");
        assert_eq!(candidates, vec!["b2".to_string(), "b1".to_string()]);
    }

    #[test]
    fn no_match_returns_empty() {
        let router = Router::from_config(&[route("r1", "/api/*", PatternKind::Glob, "b1")]).unwrap();
        assert!(router.resolve(None, "/other").is_empty());
    }
}
