/// Checks if a domain matches a wildcard pattern
///
/// 1. Exact match: "example.com" matches only "example.com"
/// 2. Wildcard match: "*.example.com" matches "example.com" and any
///    subdomain of it, however deep
///
/// # Examples
///
/// ```
/// use cattle_harvest::url::matches_wildcard;
///
/// assert!(matches_wildcard("example.com", "example.com"));
/// assert!(!matches_wildcard("example.com", "www.example.com"));
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("*.example.com", "myexample.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

/// Returns true if any pattern in the list matches the domain
pub fn matches_any<S: AsRef<str>>(patterns: &[S], candidate: &str) -> bool {
    patterns
        .iter()
        .any(|p| matches_wildcard(p.as_ref(), candidate))
}

/// Picks the most specific pattern matching a domain
///
/// An exact pattern beats every wildcard; among wildcards the longest base
/// wins, so "*.maps.example.com" beats "*.example.com".
pub fn most_specific_match<'a, I>(patterns: I, candidate: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(&'a str, usize)> = None;
    for pattern in patterns {
        if !matches_wildcard(pattern, candidate) {
            continue;
        }
        let rank = if pattern.starts_with("*.") {
            pattern.len()
        } else {
            usize::MAX
        };
        if best.map_or(true, |(_, r)| rank > r) {
            best = Some((pattern, rank));
        }
    }
    best.map(|(p, _)| p)
}
