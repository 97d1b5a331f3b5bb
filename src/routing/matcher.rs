//! Compiled route representation and match evaluation.
//!
//! # Design Decisions
//! - Host matching is case-insensitive (per HTTP spec); absent host in the
//!   route config means "match any host".
//! - Regex patterns are compiled once at load time, never per-request.
//! - A route carries its specificity score, computed once at compile time.

use regex::Regex;

use crate::config::{PatternKind, RouteConfig};

use super::pattern::{matches_exact, matches_glob, matches_prefix, specificity};

/// A route compiled from configuration: ready for per-request evaluation
/// with no further parsing.
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    pub name: String,
    pub host: Option<String>,
    pub pattern: String,
    pub kind: PatternKind,
    pub backend: String,
    pub specificity: i64,
    compiled_regex: Option<std::sync::Arc<Regex>>,
}

impl CompiledRoute {
    pub fn compile(config: &RouteConfig) -> Result<Self, String> {
        let compiled_regex = if config.pattern_kind == PatternKind::Regex {
            Some(std::sync::Arc::new(
                Regex::new(&config.pattern).map_err(|e| format!("invalid regex route pattern '{}': {e}", config.pattern))?,
            ))
        } else {
            None
        };

        Ok(Self {
            name: config.name.clone(),
            host: config.host.as_ref().map(|h| h.to_lowercase()),
            pattern: config.pattern.clone(),
            kind: config.pattern_kind,
            backend: config.backend.clone(),
            specificity: specificity(&config.pattern),
            compiled_regex,
        })
    }
}

/// Stateless matcher: evaluates whether a compiled route matches a given
/// host/path pair. Host and path conditions are combined with AND semantics.
pub struct Matcher;

impl Matcher {
    pub fn host_matches(route: &CompiledRoute, host: Option<&str>) -> bool {
        match &route.host {
            None => true,
            Some(expected) => host
                .map(|h| h.to_lowercase() == *expected)
                .unwrap_or(false),
        }
    }

    pub fn path_matches(route: &CompiledRoute, path: &str) -> bool {
        match route.kind {
            PatternKind::Exact => matches_exact(&route.pattern, path),
            PatternKind::Prefix => matches_prefix(&route.pattern, path),
            PatternKind::Glob => matches_glob(&route.pattern, path),
            PatternKind::Regex => route
                .compiled_regex
                .as_ref()
                .map(|re| re.is_match(path))
                .unwrap_or(false),
        }
    }

    pub fn matches(route: &CompiledRoute, host: Option<&str>, path: &str) -> bool {
        Self::host_matches(route, host) && Self::path_matches(route, path)
    }
}
