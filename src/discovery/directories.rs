//! Business directory crawler
//!
//! Listing searches are paginated per region and term. Listing cards are
//! parsed straight into contacts; only cards exposing an email are saved.

use crate::config::{CountryProfile, DirectorySite};
use crate::crawler::{resolve_link, PageFetcher};
use crate::discovery::quote_plus;
use crate::extract::{find_email, normalize_phone, ContactCandidate};
use crate::storage::StorageResult;
use crate::worker::{ContactBook, Shutdown};
use scraper::{ElementRef, Html, Selector};
use std::sync::{Arc, OnceLock};
use url::Url;

const YELP_BASE_URL: &str = "https://www.yelp.com";
const YELP_TERMS: &[&str] = &["cattle ranch", "cattle farm", "beef farm"];
const YELP_PAGE_SIZE: u32 = 10;
const YELP_PAGES: u32 = 2;

const MANTA_BASE_URL: &str = "https://www.manta.com";
const MANTA_TERM: &str = "cattle ranch";

/// One business card from a listing page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryListing {
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub website: Option<String>,
    pub email: Option<String>,
    /// Region the search targeted
    pub region: String,
    /// Listing page the card came from
    pub page_url: String,
}

impl DirectoryListing {
    /// Converts a card with an email into a contact candidate
    ///
    /// The source URL is the business website, or the listing page when the
    /// card links nowhere.
    pub fn to_candidate(&self) -> Option<ContactCandidate> {
        let email = self.email.clone()?;
        Some(ContactCandidate {
            farm_name: Some(self.name.clone()),
            emails: vec![email],
            phones: self.phone.iter().cloned().collect(),
            address: self.address.clone(),
            city: self.city.clone(),
            website: self.website.clone(),
            source_url: self
                .website
                .clone()
                .unwrap_or_else(|| self.page_url.clone()),
            ..Default::default()
        })
    }
}

/// Outcome of one directory crawl
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryReport {
    pub pages_fetched: u64,
    pub listings: u64,
    pub contacts_saved: u64,
}

impl DirectoryReport {
    fn absorb(&mut self, other: DirectoryReport) {
        self.pages_fetched += other.pages_fetched;
        self.listings += other.listings;
        self.contacts_saved += other.contacts_saved;
    }
}

/// Returns the listing searches of one site for a region
///
/// Each inner list holds the page URLs of one search in order; a search
/// stops at its first failed or empty page.
pub fn listing_pages(site: DirectorySite, profile: &CountryProfile, region: &str) -> Vec<Vec<String>> {
    let region_q = quote_plus(region);
    match site {
        DirectorySite::YellowPages => {
            let Some(yp) = &profile.yellowpages else {
                return Vec::new();
            };
            yp.terms
                .iter()
                .map(|term| {
                    let term_q = quote_plus(term);
                    (1..=yp.max_pages)
                        .map(|page| {
                            let path = yp
                                .path_template
                                .replace("{term}", &term_q)
                                .replace("{region}", &region_q)
                                .replace("{page}", &page.to_string());
                            format!("{}{}", yp.base_url.trim_end_matches('/'), path)
                        })
                        .collect()
                })
                .collect()
        }
        DirectorySite::Yelp => YELP_TERMS
            .iter()
            .map(|term| {
                (0..YELP_PAGES)
                    .map(|page| {
                        format!(
                            "{}/search?find_desc={}&find_loc={}&start={}",
                            YELP_BASE_URL,
                            quote_plus(term),
                            region_q,
                            page * YELP_PAGE_SIZE
                        )
                    })
                    .collect()
            })
            .collect(),
        DirectorySite::Manta => vec![vec![format!(
            "{}/search?search_source=nav&search={}&search_location={}",
            MANTA_BASE_URL,
            quote_plus(MANTA_TERM),
            region_q
        )]],
    }
}

/// Card selectors of one directory site
struct Layout {
    listing: Selector,
    name: Selector,
    phone: Selector,
    address: Option<Selector>,
    locality: Option<Selector>,
    website: Option<Selector>,
    /// Relative website links point back into the directory itself
    absolute_website_only: bool,
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static CSS selector is valid")
}

fn layout(site: DirectorySite) -> &'static Layout {
    static YELLOWPAGES: OnceLock<Layout> = OnceLock::new();
    static YELP: OnceLock<Layout> = OnceLock::new();
    static MANTA: OnceLock<Layout> = OnceLock::new();

    match site {
        DirectorySite::YellowPages => YELLOWPAGES.get_or_init(|| Layout {
            listing: selector(
                ".result, .v-card, .search-results .srp-listing, .listing, .search-result, \
                 [class*='listing-content'], [class*='search-contact'], [class*='resultBody']",
            ),
            name: selector(
                ".business-name, .n a, h2 a, h3 a, [class*='name'] a, [class*='title'] a",
            ),
            phone: selector(".phones, .phone, .primary, [class*='phone']"),
            address: Some(selector(".street-address, .adr, [class*='address']")),
            locality: Some(selector(".locality, [class*='locality']")),
            website: Some(selector(
                "a.track-visit-website, a[href*='website'], a[class*='website']",
            )),
            absolute_website_only: true,
        }),
        DirectorySite::Yelp => YELP.get_or_init(|| Layout {
            listing: selector(
                "[data-testid='serp-ia-card'], .container__09f24__mpR8_, li.border-color",
            ),
            name: selector("a[href*='/biz/'] span, h3 a, h3 span"),
            phone: selector("[class*='phone'], .phone"),
            address: None,
            locality: Some(selector("[class*='secondaryAttributes'], .priceRange")),
            website: Some(selector("a[href*='/biz/']")),
            absolute_website_only: false,
        }),
        DirectorySite::Manta => MANTA.get_or_init(|| Layout {
            listing: selector(".listing, .search-result, [class*='result']"),
            name: selector("h3 a, .business-name a, [class*='name'] a"),
            phone: selector("[class*='phone'], .phone"),
            address: Some(selector("[class*='address'], .address")),
            locality: None,
            website: None,
            absolute_website_only: false,
        }),
    }
}

fn mailto_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| selector("a[href^='mailto:']"))
}

fn first_text(card: ElementRef<'_>, selector: &Selector) -> Option<String> {
    card.select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

fn card_email(card: ElementRef<'_>) -> Option<String> {
    let text: String = card.text().collect::<Vec<_>>().join(" ");
    find_email(&text).or_else(|| {
        card.select(mailto_selector())
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| href.get(7..))
            .filter_map(|rest| rest.split('?').next())
            .find_map(find_email)
    })
}

/// Parses the business cards of a listing page
///
/// Cards without a name are dropped.
pub fn parse_listings(site: DirectorySite, html: &str, page_url: &str, region: &str) -> Vec<DirectoryListing> {
    let layout = layout(site);
    let base = Url::parse(page_url).ok();
    let document = Html::parse_document(html);

    document
        .select(&layout.listing)
        .filter_map(|card| {
            let name = first_text(card, &layout.name)?;

            let phone = first_text(card, &layout.phone)
                .map(|raw| normalize_phone(&raw).unwrap_or(raw));
            let address = layout.address.as_ref().and_then(|s| first_text(card, s));
            let city = layout
                .locality
                .as_ref()
                .and_then(|s| first_text(card, s))
                .and_then(|text| text.split(',').next().map(|c| c.trim().to_string()))
                .filter(|c| !c.is_empty());
            let website = layout.website.as_ref().and_then(|s| {
                let href = card.select(s).next()?.value().attr("href")?;
                if layout.absolute_website_only {
                    href.starts_with("http").then(|| href.to_string())
                } else {
                    resolve_link(href, base.as_ref()?)
                }
            });

            Some(DirectoryListing {
                name,
                phone,
                address,
                city,
                website,
                email: card_email(card),
                region: region.to_string(),
                page_url: page_url.to_string(),
            })
        })
        .collect()
}

pub struct DirectoryCrawler {
    fetcher: Arc<PageFetcher>,
    contacts: ContactBook,
    shutdown: Shutdown,
}

impl DirectoryCrawler {
    pub fn new(fetcher: Arc<PageFetcher>, contacts: ContactBook, shutdown: Shutdown) -> Self {
        Self {
            fetcher,
            contacts,
            shutdown,
        }
    }

    /// Runs every listing search of `site` over `regions`
    pub async fn crawl(
        &self,
        site: DirectorySite,
        country: &str,
        profile: &CountryProfile,
        regions: &[String],
    ) -> StorageResult<DirectoryReport> {
        let mut report = DirectoryReport::default();

        for region in regions {
            for pages in listing_pages(site, profile, region) {
                if self.shutdown.is_requested() {
                    return Ok(report);
                }
                report.absorb(self.run_search(site, country, region, &pages).await?);
            }
        }

        tracing::info!(
            "{:?} ({}): {} listings, {} contacts saved",
            site,
            country,
            report.listings,
            report.contacts_saved
        );
        Ok(report)
    }

    async fn run_search(
        &self,
        site: DirectorySite,
        country: &str,
        region: &str,
        pages: &[String],
    ) -> StorageResult<DirectoryReport> {
        let mut report = DirectoryReport::default();

        for (index, url) in pages.iter().enumerate() {
            let page = match self.fetcher.fetch(url).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::debug!("Listing page failed, ending search: {}: {}", url, e);
                    break;
                }
            };
            report.pages_fetched += 1;

            let page_url = url.clone();
            let owned_region = region.to_string();
            let listings = tokio::task::spawn_blocking(move || {
                parse_listings(site, &page.html, &page_url, &owned_region)
            })
            .await
            .unwrap_or_default();

            if listings.is_empty() {
                break;
            }
            report.listings += listings.len() as u64;

            let contacts: Vec<_> = listings
                .iter()
                .filter_map(DirectoryListing::to_candidate)
                .flat_map(|candidate| {
                    self.contacts
                        .build_contacts(&candidate, None, country, Some(region))
                })
                .collect();
            report.contacts_saved += self.contacts.save(&contacts)?;

            tracing::info!(
                "{:?} [{}] page {}: {} listings, {} with email",
                site,
                region,
                index + 1,
                listings.len(),
                contacts.len()
            );
        }

        Ok(report)
    }
}
