//! Breed association and regional membership directory crawler
//!
//! Every page fetched here is also mined for contacts, so a directory page
//! never has to be fetched twice.

use crate::config::CountryProfile;
use crate::crawler::{page_links, PageFetcher};
use crate::extract::{ContactCandidate, Extractor};
use crate::storage::StorageResult;
use crate::worker::{ContactBook, Shutdown};
use scraper::Html;
use std::collections::BTreeSet;
use std::sync::Arc;
use url::Url;

const BREEDER_HREF_KEYWORDS: &[&str] = &["breeder", "ranch", "farm", "member", "profile"];
const BREEDER_TEXT_KEYWORDS: &[&str] = &["ranch", "farm", "cattle", "angus", "hereford"];
const MEMBER_HREF_KEYWORDS: &[&str] = &["member", "ranch", "farm", "profile", "detail"];

/// A regional page shorter than this is treated as a placeholder
const MIN_DIRECTORY_HTML_LEN: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkKind {
    Breeder,
    Member,
}

/// Outcome of one association crawl
#[derive(Debug, Default)]
pub struct AssociationReport {
    /// Unique profile and member page URLs, sorted
    pub urls: Vec<String>,
    pub contacts_saved: u64,
    pub pages_fetched: u64,
}

pub struct AssociationCrawler {
    fetcher: Arc<PageFetcher>,
    extractor: Arc<dyn Extractor>,
    contacts: ContactBook,
    shutdown: Shutdown,
}

impl AssociationCrawler {
    pub fn new(
        fetcher: Arc<PageFetcher>,
        extractor: Arc<dyn Extractor>,
        contacts: ContactBook,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            contacts,
            shutdown,
        }
    }

    /// Crawls breed directories, then the regional sites of `regions`
    ///
    /// An empty region list crawls every regional site of the country.
    pub async fn crawl(
        &self,
        country: &str,
        profile: &CountryProfile,
        regions: &[String],
    ) -> StorageResult<AssociationReport> {
        let mut report = AssociationReport::default();
        let mut urls = BTreeSet::new();

        for directory in &profile.associations.breed_directories {
            if self.shutdown.is_requested() {
                break;
            }
            tracing::info!("Crawling breed directory {}", directory);
            let page = match self.fetcher.fetch(directory).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!("Failed to fetch {}: {}", directory, e);
                    continue;
                }
            };
            report.pages_fetched += 1;

            let (saved, links) = self
                .harvest(page.html, directory, country, None, LinkKind::Breeder)
                .await?;
            report.contacts_saved += saved;
            tracing::info!("{}: {} breeder links", directory, links.len());
            urls.extend(links);
        }

        let regional = profile
            .associations
            .regional
            .iter()
            .filter(|(region, _)| regions.is_empty() || regions.contains(region));

        'sites: for (region, site) in regional {
            for path in &profile.associations.member_paths {
                if self.shutdown.is_requested() {
                    break 'sites;
                }
                let url = format!("{}{}", site.trim_end_matches('/'), path);
                let page = match self.fetcher.fetch(&url).await {
                    Ok(page) => page,
                    Err(e) => {
                        tracing::debug!("No member directory at {}: {}", url, e);
                        continue;
                    }
                };
                report.pages_fetched += 1;
                if page.html.len() <= MIN_DIRECTORY_HTML_LEN {
                    continue;
                }

                let (saved, links) = self
                    .harvest(page.html, &url, country, Some(region), LinkKind::Member)
                    .await?;
                report.contacts_saved += saved;
                if !links.is_empty() {
                    tracing::info!("{} association ({}): {} member links", region, path, links.len());
                    urls.extend(links);
                    break;
                }
            }
        }

        report.urls = urls.into_iter().collect();
        tracing::info!(
            "Association crawl complete: {} URLs, {} contacts saved inline",
            report.urls.len(),
            report.contacts_saved
        );
        Ok(report)
    }

    /// Saves the page's contacts and returns its directory links
    async fn harvest(
        &self,
        html: String,
        url: &str,
        country: &str,
        region: Option<&str>,
        kind: LinkKind,
    ) -> StorageResult<(u64, Vec<String>)> {
        let extractor = self.extractor.clone();
        let page_url = url.to_string();
        let parsed = tokio::task::spawn_blocking(move || {
            let candidate = extractor.extract(&html, &page_url);
            let links = directory_links(&html, &page_url, kind);
            (candidate, links)
        })
        .await;

        let (candidate, links): (ContactCandidate, Vec<String>) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!("Extraction task failed for {}: {}", url, e);
                return Ok((0, Vec::new()));
            }
        };

        let contacts = self.contacts.build_contacts(&candidate, None, country, region);
        let saved = self.contacts.save(&contacts)?;
        if saved > 0 {
            tracing::info!("Saved {} contacts inline from {}", saved, url);
        }
        Ok((saved, links))
    }
}

fn directory_links(html: &str, page_url: &str, kind: LinkKind) -> Vec<String> {
    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let links: BTreeSet<String> = page_links(&document, &base)
        .into_iter()
        .filter(|link| {
            let href = link.href.to_lowercase();
            match kind {
                LinkKind::Breeder => {
                    let text = link.text.to_lowercase();
                    BREEDER_HREF_KEYWORDS.iter().any(|k| href.contains(k))
                        || BREEDER_TEXT_KEYWORDS.iter().any(|k| text.contains(k))
                }
                LinkKind::Member => MEMBER_HREF_KEYWORDS.iter().any(|k| href.contains(k)),
            }
        })
        .map(|link| link.url)
        .collect();
    links.into_iter().collect()
}

/// Links on a breed association page that lead to breeder profiles
pub fn breeder_links(html: &str, page_url: &str) -> Vec<String> {
    directory_links(html, page_url, LinkKind::Breeder)
}

/// Links on a regional association page that lead to member profiles
pub fn member_links(html: &str, page_url: &str) -> Vec<String> {
    directory_links(html, page_url, LinkKind::Member)
}
