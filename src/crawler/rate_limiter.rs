//! Per-domain request throttle

use crate::config::RateLimitConfig;
use crate::state::DomainState;
use crate::url::{domain_of, most_specific_match};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// Enforces a minimum interval between request starts per domain
///
/// Callers for the same domain are serialized through that domain's async
/// lock; callers for different domains never wait on each other. State is
/// in-memory only.
pub struct RateLimiter {
    default_interval: Duration,
    overrides: BTreeMap<String, Duration>,
    domains: Mutex<HashMap<String, Arc<tokio::sync::Mutex<DomainState>>>>,
}

impl RateLimiter {
    /// Creates a limiter with a default interval and per-pattern overrides
    pub fn new(default_interval: Duration, overrides: BTreeMap<String, Duration>) -> Self {
        Self {
            default_interval,
            overrides,
            domains: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a limiter from the `[rate-limits]` section
    pub fn from_config(config: &RateLimitConfig) -> Self {
        let overrides = config
            .domains
            .iter()
            .map(|(pattern, ms)| (pattern.to_lowercase(), Duration::from_millis(*ms)))
            .collect();
        Self::new(Duration::from_millis(config.default_interval_ms), overrides)
    }

    /// Returns the interval that applies to a domain
    pub fn interval_for(&self, domain: &str) -> Duration {
        most_specific_match(self.overrides.keys().map(String::as_str), domain)
            .and_then(|pattern| self.overrides.get(pattern))
            .copied()
            .unwrap_or(self.default_interval)
    }

    /// Waits until a request to the URL's domain may start, then records it
    ///
    /// URLs without a host pass through immediately.
    pub async fn wait(&self, url: &str) {
        if let Some(domain) = domain_of(url) {
            self.wait_domain(&domain).await;
        }
    }

    /// Waits for a slot on a domain, then records the request start
    pub async fn wait_domain(&self, domain: &str) {
        let state = self.state_for(domain);
        let mut state = state.lock().await;

        let slot = state.next_slot(Instant::now());
        if slot > Instant::now() {
            tracing::trace!("Throttling {} for {:?}", domain, slot - Instant::now());
            sleep_until(slot).await;
        }
        state.record_request(std::cmp::max(slot, Instant::now()));
    }

    /// Number of requests recorded for a domain
    pub async fn request_count(&self, domain: &str) -> u64 {
        let state = self.state_for(domain);
        let count = state.lock().await.request_count;
        count
    }

    fn state_for(&self, domain: &str) -> Arc<tokio::sync::Mutex<DomainState>> {
        let mut domains = self
            .domains
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        domains
            .entry(domain.to_string())
            .or_insert_with(|| {
                Arc::new(tokio::sync::Mutex::new(DomainState::new(
                    self.interval_for(domain),
                )))
            })
            .clone()
    }
}
