use crate::{UrlError, UrlResult};
use url::Url;

/// Query parameters that only carry campaign tracking
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "msclkid", "mc_eid", "mc_cid", "_ga"];

/// Normalizes a URL into its frontier key
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Reject schemes other than HTTP(S) and URLs without a host
/// 3. Lowercase the host (the parser already does this for special schemes)
/// 4. Remove the fragment
/// 5. Remove tracking query parameters (`utm_*`, `fbclid`, `gclid`...)
/// 6. Remove an empty query string
///
/// Scheme, `www.` prefix, path and the order of the remaining parameters are
/// kept as-is: farm sites are often reachable on only one of those variants.
///
/// # Examples
///
/// ```
/// use cattle_harvest::url::normalize_url;
///
/// let url = normalize_url("https://WWW.Example.com/contact?utm_source=x#top").unwrap();
/// assert_eq!(url.as_str(), "https://www.example.com/contact");
/// ```
pub fn normalize_url(url_str: &str) -> UrlResult<Url> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = url.host_str().ok_or(UrlError::MissingDomain)?.to_lowercase();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    url.set_fragment(None);

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !is_tracking_param(k))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    Ok(url)
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_host() {
        let url = normalize_url("https://EXAMPLE.COM/Path").unwrap();
        assert_eq!(url.as_str(), "https://example.com/Path");
    }

    #[test]
    fn test_keeps_scheme_and_www() {
        let url = normalize_url("http://www.farm.com/").unwrap();
        assert_eq!(url.as_str(), "http://www.farm.com/");
    }

    #[test]
    fn test_removes_fragment() {
        let url = normalize_url("https://farm.com/about#team").unwrap();
        assert_eq!(url.as_str(), "https://farm.com/about");
    }

    #[test]
    fn test_removes_tracking_params() {
        let url =
            normalize_url("https://farm.com/p?utm_source=ddg&id=7&fbclid=abc&UTM_Medium=x").unwrap();
        assert_eq!(url.as_str(), "https://farm.com/p?id=7");
    }

    #[test]
    fn test_removes_query_left_empty() {
        let url = normalize_url("https://farm.com/p?gclid=1").unwrap();
        assert_eq!(url.as_str(), "https://farm.com/p");
    }

    #[test]
    fn test_keeps_param_order() {
        let url = normalize_url("https://farm.com/s?b=2&a=1").unwrap();
        assert_eq!(url.query(), Some("b=2&a=1"));
    }

    #[test]
    fn test_rejects_non_http_schemes() {
        assert!(matches!(
            normalize_url("mailto:rancher@farm.com"),
            Err(UrlError::InvalidScheme(_))
        ));
        assert!(matches!(
            normalize_url("ftp://farm.com/file"),
            Err(UrlError::InvalidScheme(_))
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(normalize_url("not a url"), Err(UrlError::Parse(_))));
        assert!(normalize_url("").is_err());
    }

    #[test]
    fn test_idempotent() {
        let once = normalize_url("https://Farm.com/a?utm_campaign=z&x=1#f").unwrap();
        let twice = normalize_url(once.as_str()).unwrap();
        assert_eq!(once, twice);
    }
}
