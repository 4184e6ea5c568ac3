//! Search backends

use crate::crawler::{resolve_link, RateLimiter};
use async_trait::async_trait;
use reqwest::{header, Client};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

const SEARCH_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Search backend errors
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("search returned HTTP {0}")]
    Status(u16),

    #[error("invalid search endpoint: {0}")]
    Endpoint(String),
}

/// Runs one query and returns result URLs
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, SearchError>;
}

/// DuckDuckGo's JavaScript-free results page
pub struct DuckDuckGoHtml {
    client: Client,
    base_url: String,
    limiter: Arc<RateLimiter>,
}

impl DuckDuckGoHtml {
    pub fn new(client: Client, base_url: impl Into<String>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            limiter,
        }
    }
}

#[async_trait]
impl SearchBackend for DuckDuckGoHtml {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, SearchError> {
        let base = Url::parse(&self.base_url).map_err(|e| SearchError::Endpoint(e.to_string()))?;

        self.limiter.wait(&self.base_url).await;
        let response = self
            .client
            .get(base.clone())
            .query(&[("q", query)])
            .header(header::USER_AGENT, SEARCH_USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status(status.as_u16()));
        }
        let html = response.text().await?;

        let urls = tokio::task::spawn_blocking(move || parse_result_links(&html, &base, max_results))
            .await
            .unwrap_or_default();
        tracing::debug!("Query '{}' -> {} URLs", query, urls.len());
        Ok(urls)
    }
}

fn result_link_selector() -> &'static Selector {
    static SEL: std::sync::OnceLock<Selector> = std::sync::OnceLock::new();
    SEL.get_or_init(|| Selector::parse("a.result__a").expect("static CSS selector is valid"))
}

/// Extracts organic result URLs from a results page
///
/// Redirect links (`/l/?uddg=...`) are unwrapped, links back to the search
/// engine are dropped, and duplicates keep their first position.
pub fn parse_result_links(html: &str, base: &Url, max_results: usize) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for link in document.select(result_link_selector()) {
        if urls.len() >= max_results {
            break;
        }
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some(resolved) = resolve_link(href, base) else {
            continue;
        };
        let Some(target) = unwrap_redirect(&resolved) else {
            continue;
        };
        let on_search_engine = Url::parse(&target)
            .ok()
            .map(|u| {
                u.origin() == base.origin()
                    || u.host_str().map_or(true, |h| h.ends_with("duckduckgo.com"))
            })
            .unwrap_or(true);
        if on_search_engine {
            continue;
        }
        if seen.insert(target.clone()) {
            urls.push(target);
        }
    }

    urls
}

fn unwrap_redirect(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    if url.path().starts_with("/l/") {
        return url
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned())
            .filter(|v| v.starts_with("http://") || v.starts_with("https://"));
    }
    Some(link.to_string())
}
