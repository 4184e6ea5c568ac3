//! Single-URL pipeline: fetch, extract, store, finish

use crate::crawler::{find_contact_link, page_text, PageFetcher};
use crate::extract::{CattleMetadata, ContactCandidate, Extractor};
use crate::storage::{ClaimedUrl, StorageResult};
use crate::worker::{ContactBook, Frontier};
use std::sync::Arc;

/// Stored as the failure reason when a blocking extraction task dies
const EXTRACTION_FAILED: &str = "extraction failed";

pub struct UrlProcessor {
    fetcher: Arc<PageFetcher>,
    extractor: Arc<dyn Extractor>,
    frontier: Frontier,
    contacts: ContactBook,
}

impl UrlProcessor {
    pub fn new(
        fetcher: Arc<PageFetcher>,
        extractor: Arc<dyn Extractor>,
        frontier: Frontier,
        contacts: ContactBook,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            frontier,
            contacts,
        }
    }

    /// Processes one claimed URL and returns the number of contacts stored
    ///
    /// The URL always ends in a terminal status unless the store itself
    /// fails.
    pub async fn process(&self, claimed: &ClaimedUrl) -> StorageResult<u64> {
        let url = claimed.url.as_str();

        if self.frontier.is_completed(url)? {
            return Ok(0);
        }

        // Already harvested inline by a directory or association crawl
        if self.contacts.has_contact_from_source(url)? {
            self.frontier.mark_done(url, 1, None)?;
            return Ok(0);
        }

        let page = match self.fetcher.fetch(url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::debug!("Fetch failed for {}: {}", url, e);
                self.frontier.mark_done(url, 0, Some(&e.to_string()))?;
                return Ok(0);
            }
        };
        let html: Arc<str> = Arc::from(page.html);

        let Some((mut candidate, contact_link)) = self.extract_page(html.clone(), url).await else {
            self.frontier.mark_done(url, 0, Some(EXTRACTION_FAILED))?;
            return Ok(0);
        };

        if candidate.emails.is_empty() {
            if let Some(link) = contact_link {
                if !self.frontier.is_seen(&link)? {
                    self.follow_contact_page(&link, &mut candidate).await;
                }
            }
        }

        if candidate.emails.is_empty() {
            self.frontier.mark_done(url, 0, None)?;
            return Ok(0);
        }

        let metadata = self.extract_metadata(html).await;
        // The discovery region only stands in when the page names none
        let region_hint = match candidate.region {
            Some(_) => None,
            None => claimed.region_hint.as_deref(),
        };
        let contacts = self.contacts.build_contacts(
            &candidate,
            Some(&metadata),
            &claimed.country,
            region_hint,
        );
        let stored = self.contacts.save(&contacts)?;

        self.frontier
            .mark_done(url, candidate.emails.len() as u32, None)?;
        tracing::debug!("{}: {} emails, {} contacts stored", url, candidate.emails.len(), stored);
        Ok(stored)
    }

    /// Extracts contacts and, when none carry an email, a contact page link
    async fn extract_page(&self, html: Arc<str>, url: &str) -> Option<(ContactCandidate, Option<String>)> {
        let extractor = self.extractor.clone();
        let page_url = url.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let candidate = extractor.extract(&html, &page_url);
            let link = if candidate.emails.is_empty() {
                find_contact_link(&html, &page_url)
            } else {
                None
            };
            (candidate, link)
        })
        .await;

        match result {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::error!("Extraction task failed for {}: {}", url, e);
                None
            }
        }
    }

    /// Merges emails and blank location fields from a linked contact page
    async fn follow_contact_page(&self, link: &str, candidate: &mut ContactCandidate) {
        let page = match self.fetcher.fetch(link).await {
            Ok(page) => page,
            Err(e) => {
                tracing::debug!("Contact page {} failed: {}", link, e);
                return;
            }
        };

        let extractor = self.extractor.clone();
        let page_url = link.to_string();
        let html = page.html;
        match tokio::task::spawn_blocking(move || extractor.extract(&html, &page_url)).await {
            Ok(extra) => {
                tracing::debug!("Contact page {} added {} emails", link, extra.emails.len());
                candidate.merge_from(extra);
            }
            Err(e) => tracing::error!("Extraction task failed for {}: {}", link, e),
        }
    }

    async fn extract_metadata(&self, html: Arc<str>) -> CattleMetadata {
        let extractor = self.extractor.clone();
        tokio::task::spawn_blocking(move || extractor.extract_metadata(&page_text(&html)))
            .await
            .unwrap_or_default()
    }
}
