//! HTML helpers shared by the fetcher, the URL processor and the crawlers
//!
//! This module handles:
//! - Visible text extraction (script and style content excluded)
//! - JavaScript shell detection for the render fallback
//! - Link resolution and link listing
//! - Locating a same-site contact page

use scraper::{Html, Selector};
use url::Url;

/// Markers of client-rendered pages
const JS_SHELL_MARKERS: &[&str] = &[
    "window.__NEXT_DATA__",
    "window.__NUXT__",
    "<div id=\"app\"></div>",
    "<div id=\"root\"></div>",
    "React.createElement",
    "ng-app",
    "__GATSBY",
    "Loading...</",
];

/// Pages shorter than this (after trimming) are always rendered
const MIN_HTML_LEN: usize = 500;

/// A marked page with less visible text than this is rendered
const MIN_MARKED_TEXT_LEN: usize = 200;

const CONTACT_TEXT_KEYWORDS: &[&str] = &["contact", "get in touch", "reach us", "email us"];
const CONTACT_HREF_KEYWORDS: &[&str] = &["/contact", "/about", "/reach-us"];

/// A link with its resolved target and anchor text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    /// Absolute http(s) URL
    pub url: String,
    /// Raw href attribute as written in the page
    pub href: String,
    /// Trimmed anchor text
    pub text: String,
}

/// Collects the visible text of a document, space separated
pub fn visible_text(document: &Html) -> String {
    let mut out = String::new();
    for node in document.root_element().descendants() {
        let text = match node.value().as_text() {
            Some(text) => text,
            None => continue,
        };
        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element())
            .map_or(false, |el| {
                matches!(el.name(), "script" | "style" | "noscript" | "template")
            });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(trimmed);
    }
    out
}

/// Parses HTML and returns its visible text
pub fn page_text(html: &str) -> String {
    visible_text(&Html::parse_document(html))
}

/// Returns true when a fetched page looks like an unrendered JavaScript shell
///
/// CPU-bound; callers on the async runtime run it on the blocking pool.
pub fn needs_heavy_render(html: &str) -> bool {
    if html.trim().len() < MIN_HTML_LEN {
        return true;
    }
    if JS_SHELL_MARKERS.iter().any(|marker| html.contains(marker)) {
        let text: usize = page_text(html)
            .chars()
            .filter(|c| !c.is_whitespace())
            .count();
        return text < MIN_MARKED_TEXT_LEN;
    }
    false
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}

/// Lists every followable `<a href>` of a document in page order
pub fn page_links(document: &Html, base_url: &Url) -> Vec<PageLink> {
    let selector = match Selector::parse("a[href]") {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    document
        .select(&selector)
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            let url = resolve_link(href, base_url)?;
            Some(PageLink {
                url,
                href: href.to_string(),
                text: element.text().collect::<String>().trim().to_string(),
            })
        })
        .collect()
}

/// Finds the first same-site link that looks like a contact page
///
/// A link qualifies when its text mentions contact / get in touch /
/// reach us / email us, or its href contains /contact, /about or /reach-us.
pub fn find_contact_link(html: &str, page_url: &str) -> Option<String> {
    let base = Url::parse(page_url).ok()?;
    let host = base.host_str()?.to_lowercase();
    let document = Html::parse_document(html);

    page_links(&document, &base).into_iter().find_map(|link| {
        let text = link.text.to_lowercase();
        let href = link.href.to_lowercase();
        let looks_like_contact = CONTACT_TEXT_KEYWORDS.iter().any(|k| text.contains(k))
            || CONTACT_HREF_KEYWORDS.iter().any(|k| href.contains(k));
        if !looks_like_contact {
            return None;
        }

        let target = Url::parse(&link.url).ok()?;
        if target.host_str()?.to_lowercase() == host {
            Some(link.url)
        } else {
            None
        }
    })
}
