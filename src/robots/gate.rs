//! Per-origin robots.txt cache

use crate::robots::{fetch_robots, product_token, ParsedRobots};
use crate::url::origin_of;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

/// Cached robots.txt compliance check
///
/// Each origin is fetched once for the lifetime of the gate. Concurrent
/// first lookups of one origin share a single fetch.
pub struct RobotsGate {
    client: Client,
    product_token: String,
    origins: Mutex<HashMap<String, Arc<OnceCell<ParsedRobots>>>>,
}

impl RobotsGate {
    /// Creates a gate that identifies itself with `user_agent`
    ///
    /// Rules are evaluated against the product token of the user agent
    /// ("CattleScraper/1.0" is matched as "CattleScraper").
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            product_token: product_token(user_agent).to_string(),
            origins: Mutex::new(HashMap::new()),
        })
    }

    /// Returns true if the URL may be fetched
    ///
    /// Unparseable URLs and URLs without a host are allowed; the fetch
    /// itself will reject them.
    pub async fn is_allowed(&self, url: &str) -> bool {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(_) => return true,
        };
        let origin = match origin_of(&parsed) {
            Some(origin) => origin,
            None => return true,
        };

        let cell = self.cell_for(&origin);
        let robots = cell
            .get_or_init(|| async {
                tracing::debug!("Fetching robots.txt for {}", origin);
                fetch_robots(&self.client, &origin).await
            })
            .await;

        robots.is_allowed(url, &self.product_token)
    }

    /// Number of origins with a cached (or in-flight) robots.txt
    pub fn cached_origins(&self) -> usize {
        self.origins
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn cell_for(&self, origin: &str) -> Arc<OnceCell<ParsedRobots>> {
        let mut origins = self
            .origins
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        origins
            .entry(origin.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }
}
