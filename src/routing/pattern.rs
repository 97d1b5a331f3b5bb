//! Pattern matching and specificity scoring shared by the route resolver
//! (C7) and the rate-limit rule matcher's endpoint predicate (C3).
//!
//! Glob semantics (§4.3): `*` matches exactly one path segment, `**` matches
//! any number of segments (including zero).

/// Specificity = literal-char count − 10·single-wildcards − 50·double-wildcards
/// (§3: RouteEntry). Higher wins; used to order overlapping route/backend
/// candidates and to order rate-limit rules of equal priority.
pub fn specificity(pattern: &str) -> i64 {
    let mut score: i64 = 0;
    for segment in pattern.split('/') {
        if segment == "**" {
            score -= 50;
        } else if segment == "*" {
            score -= 10;
        } else {
            score += segment.chars().count() as i64;
        }
    }
    score
}

/// Exact match.
pub fn matches_exact(pattern: &str, path: &str) -> bool {
    pattern == path
}

/// Prefix match on full path segments (a prefix of `/api` must not match
/// `/apiextra`).
pub fn matches_prefix(pattern: &str, path: &str) -> bool {
    if path == pattern {
        return true;
    }
    let prefix = if pattern.ends_with('/') {
        pattern.to_string()
    } else {
        format!("{pattern}/")
    };
    path.starts_with(&prefix)
}

/// Glob match: `*` = one segment, `**` = any number of segments.
pub fn matches_glob(pattern: &str, path: &str) -> bool {
    let pattern_segments: Vec<&str> = pattern.split('/').collect();
    let path_segments: Vec<&str> = path.split('/').collect();
    glob_segments(&pattern_segments, &path_segments)
}

fn glob_segments(pattern: &[&str], path: &[&str]) -> bool {
    match (pattern.first(), path.first()) {
        (None, None) => true,
        (None, Some(_)) => false,
        (Some(&"**"), _) => {
            if pattern.len() == 1 {
                return true;
            }
            // Try consuming 0..=path.len() segments with the `**`.
            for skip in 0..=path.len() {
                if glob_segments(&pattern[1..], &path[skip..]) {
                    return true;
                }
            }
            false
        }
        (Some(&"*"), Some(_)) => glob_segments(&pattern[1..], &path[1..]),
        (Some(p), Some(s)) if p == s => glob_segments(&pattern[1..], &path[1..]),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specificity_prefers_more_specific_pattern() {
        assert!(specificity("/api/users/*") > specificity("/api/*"));
    }

    #[test]
    fn glob_single_wildcard_matches_one_segment() {
        assert!(matches_glob("/api/*", "/api/users"));
        assert!(!matches_glob("/api/*", "/api/users/42"));
    }

    #[test]
    fn glob_double_wildcard_matches_any_depth() {
        assert!(matches_glob("/api/**", "/api/users/42"));
        assert!(matches_glob("/api/**", "/api"));
    }

    #[test]
    fn prefix_does_not_match_partial_segment() {
        assert!(matches_prefix("/api", "/api/x"));
        assert!(!matches_prefix("/api", "/apiextra"));
    }
}
