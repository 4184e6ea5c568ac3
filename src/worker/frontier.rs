//! URL frontier with at-most-once claiming
//!
//! Every discovered URL is normalized into a frontier key before it touches
//! the store. Claiming flips rows to `processing` inside one store
//! transaction, so two workers never receive the same URL.

use crate::state::UrlStatus;
use crate::storage::{lock, ClaimedUrl, SharedStorage, StorageResult, UrlOrigin};
use crate::url::{extract_domain, matches_any, normalize_url};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;

/// Normalizes a URL into its frontier key
///
/// Returns None for unparseable or non-HTTP(S) URLs.
pub fn frontier_key(url: &str) -> Option<String> {
    normalize_url(url).ok().map(|u| u.to_string())
}

#[derive(Clone)]
pub struct Frontier {
    storage: SharedStorage,
    skip_domains: Arc<Vec<String>>,
    recovery_batch: usize,
}

impl Frontier {
    pub fn new(storage: SharedStorage, skip_domains: Vec<String>, recovery_batch: usize) -> Self {
        Self {
            storage,
            skip_domains: Arc::new(skip_domains),
            recovery_batch: recovery_batch.max(1),
        }
    }

    fn is_skipped(&self, key: &str) -> bool {
        normalize_url(key)
            .ok()
            .and_then(|u| extract_domain(&u))
            .map_or(true, |domain| matches_any(&self.skip_domains, &domain))
    }

    /// Adds unseen URLs as `pending`
    ///
    /// Unparseable URLs and URLs on skip domains are dropped. Returns the
    /// number of rows actually inserted.
    pub fn enqueue(&self, urls: &[String], origin: &UrlOrigin) -> StorageResult<usize> {
        let mut seen = HashSet::new();
        let keys: Vec<String> = urls
            .iter()
            .filter_map(|url| frontier_key(url))
            .filter(|key| !self.is_skipped(key))
            .filter(|key| seen.insert(key.clone()))
            .collect();

        if keys.is_empty() {
            return Ok(0);
        }

        let added = lock(&self.storage)?.insert_urls(&keys, origin)?;
        tracing::debug!(
            "Enqueued {} of {} URLs from {} ({})",
            added,
            urls.len(),
            origin.source,
            origin.country
        );
        Ok(added)
    }

    /// Claims up to `limit` of the oldest pending URLs
    pub fn claim(&self, limit: usize, country: Option<&str>) -> StorageResult<Vec<ClaimedUrl>> {
        lock(&self.storage)?.claim_pending_urls(limit, country, Utc::now())
    }

    /// Moves a URL to its terminal status
    ///
    /// An error marks the URL `failed`; otherwise it is `completed`.
    pub fn mark_done(&self, url: &str, emails_found: u32, error: Option<&str>) -> StorageResult<()> {
        let found = lock(&self.storage)?.finish_url(url, emails_found, error, Utc::now())?;
        if !found {
            tracing::debug!("URL already finished or unknown: {}", url);
        }
        Ok(())
    }

    /// Returns true if the URL reached a terminal status
    pub fn is_completed(&self, url: &str) -> StorageResult<bool> {
        let key = frontier_key(url).unwrap_or_else(|| url.to_string());
        let record = lock(&self.storage)?.get_url(&key)?;
        Ok(record.map_or(false, |r| r.status.is_terminal()))
    }

    /// Returns true if the URL was ever discovered
    pub fn is_seen(&self, url: &str) -> StorageResult<bool> {
        let key = frontier_key(url).unwrap_or_else(|| url.to_string());
        Ok(lock(&self.storage)?.get_url(&key)?.is_some())
    }

    /// Resets every `processing` row to `pending`
    ///
    /// Runs in bounded batches and releases the store between them.
    pub fn recover_stuck(&self) -> StorageResult<usize> {
        let mut total = 0;
        loop {
            let reset = lock(&self.storage)?.reset_processing_urls(self.recovery_batch)?;
            if reset == 0 {
                break;
            }
            total += reset;
            tracing::info!("Crash recovery: reset {} URLs to pending", total);
        }
        Ok(total)
    }

    pub fn count(&self, status: UrlStatus, country: Option<&str>) -> StorageResult<u64> {
        lock(&self.storage)?.count_urls_by_status(status, country)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{share, SqliteStorage};

    fn frontier() -> Frontier {
        let storage = share(SqliteStorage::new_in_memory().unwrap());
        Frontier::new(storage, vec!["*.facebook.com".to_string(), "*.gov.uk".to_string()], 2)
    }

    fn origin() -> UrlOrigin {
        UrlOrigin {
            source: "search".to_string(),
            discovered_by: Some("angus ranch Texas".to_string()),
            country: "US".to_string(),
            region_hint: Some("Texas".to_string()),
        }
    }

    fn urls(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_enqueue_normalizes_and_filters() {
        let frontier = frontier();
        let added = frontier
            .enqueue(
                &urls(&[
                    "https://Ranch.com/contact#form",
                    "https://ranch.com/contact?utm_source=ddg",
                    "https://www.facebook.com/ranch",
                    "https://www.gov.uk/cattle",
                    "mailto:a@b.com",
                    "not a url",
                ]),
                &origin(),
            )
            .unwrap();
        assert_eq!(added, 1);
        assert!(frontier.is_seen("https://ranch.com/contact").unwrap());
        assert!(!frontier.is_seen("https://www.facebook.com/ranch").unwrap());
    }

    #[test]
    fn test_enqueue_is_idempotent() {
        let frontier = frontier();
        let batch = urls(&["https://a.com/", "https://b.com/"]);
        assert_eq!(frontier.enqueue(&batch, &origin()).unwrap(), 2);
        assert_eq!(frontier.enqueue(&batch, &origin()).unwrap(), 0);
        assert_eq!(frontier.count(UrlStatus::Pending, None).unwrap(), 2);
    }

    #[test]
    fn test_claim_then_done() {
        let frontier = frontier();
        frontier
            .enqueue(&urls(&["https://a.com/", "https://b.com/", "https://c.com/"]), &origin())
            .unwrap();

        let claimed = frontier.claim(2, Some("US")).unwrap();
        assert_eq!(claimed.len(), 2);
        assert_eq!(claimed[0].url, "https://a.com/");
        assert_eq!(frontier.count(UrlStatus::Processing, None).unwrap(), 2);
        assert!(frontier.claim(10, Some("NZ")).unwrap().is_empty());

        frontier.mark_done("https://a.com/", 2, None).unwrap();
        frontier.mark_done("https://b.com/", 0, Some("HTTP 404")).unwrap();
        assert!(frontier.is_completed("https://a.com/").unwrap());
        assert!(frontier.is_completed("https://b.com/").unwrap());
        assert!(!frontier.is_completed("https://c.com/").unwrap());
        assert_eq!(frontier.count(UrlStatus::Failed, None).unwrap(), 1);
    }

    #[test]
    fn test_recover_stuck_in_batches() {
        let frontier = frontier();
        let batch: Vec<String> = (0..5).map(|i| format!("https://r{}.com/", i)).collect();
        frontier.enqueue(&batch, &origin()).unwrap();
        assert_eq!(frontier.claim(5, None).unwrap().len(), 5);

        assert_eq!(frontier.recover_stuck().unwrap(), 5);
        assert_eq!(frontier.count(UrlStatus::Processing, None).unwrap(), 0);
        assert_eq!(frontier.count(UrlStatus::Pending, None).unwrap(), 5);
        assert_eq!(frontier.recover_stuck().unwrap(), 0);
    }
}
