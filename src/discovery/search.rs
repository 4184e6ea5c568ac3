//! Search query generation and ledger-aware execution

use crate::config::{CountryProfile, SearchConfig};
use crate::discovery::backend::SearchBackend;
use crate::storage::StorageResult;
use crate::worker::QueryLedger;
use chrono::Duration as ChronoDuration;
use std::collections::HashSet;
use std::sync::Arc;

/// Breed used for `{breed}` in the base pass of every template
const DEFAULT_BREED: &str = "angus";

/// One query text and the region it targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedQuery {
    pub text: String,
    /// Used as the frontier region hint of the URLs it finds
    pub region: String,
}

/// URLs returned by one executed query
#[derive(Debug, Clone)]
pub struct SearchBatch {
    pub urls: Vec<String>,
    pub query: PlannedQuery,
    /// Position of the query in the plan
    pub index: usize,
    pub total: usize,
    /// Queries executed so far in this run, including this one
    pub executed: usize,
}

fn fill_template(template: &str, term: &str, region: &str, breed: &str) -> String {
    template
        .replace("{term}", term)
        .replace("{region}", region)
        .replace("{breed}", breed)
}

/// Builds the deterministic query plan for a set of regions
///
/// Order is region, then template, then term. Every template is filled with
/// the default breed; templates mentioning `{breed}` also get one variant
/// per breed among the first `breed_variants` of the profile. Repeated
/// texts are dropped, the first occurrence wins.
pub fn generate_queries(
    profile: &CountryProfile,
    regions: &[String],
    breed_variants: usize,
) -> Vec<PlannedQuery> {
    let mut seen = HashSet::new();
    let mut plan = Vec::new();
    let mut push = |text: String, region: &str| {
        if seen.insert(text.clone()) {
            plan.push(PlannedQuery {
                text,
                region: region.to_string(),
            });
        }
    };

    for region in regions {
        for template in &profile.search_templates {
            let has_breed = template.contains("{breed}");
            for term in &profile.search_terms {
                push(fill_template(template, term, region, DEFAULT_BREED), region);
                if has_breed {
                    for breed in profile.breeds.iter().take(breed_variants) {
                        push(fill_template(template, term, region, breed), region);
                    }
                }
            }
        }
    }

    plan
}

/// Search discovery over a pluggable backend
pub struct SearchDiscovery {
    backend: Arc<dyn SearchBackend>,
    ledger: QueryLedger,
    config: SearchConfig,
}

impl SearchDiscovery {
    pub fn new(backend: Arc<dyn SearchBackend>, ledger: QueryLedger, config: SearchConfig) -> Self {
        Self {
            backend,
            ledger,
            config,
        }
    }

    /// Builds the query plan for a country using the configured breed count
    pub fn generate_queries(&self, profile: &CountryProfile, regions: &[String]) -> Vec<PlannedQuery> {
        generate_queries(profile, regions, self.config.breed_variants)
    }

    fn ttl(&self) -> ChronoDuration {
        ChronoDuration::days(i64::from(self.config.query_ttl_days))
    }

    /// Starts a run over the plan of `regions`
    ///
    /// The set of fresh queries is loaded once here; queries that become
    /// fresh during the run are not re-checked.
    pub fn discover(
        &self,
        profile: &CountryProfile,
        regions: &[String],
        job_id: Option<i64>,
    ) -> StorageResult<SearchRun<'_>> {
        let queries = self.generate_queries(profile, regions);
        let fresh = self.ledger.fresh_set(self.ttl())?;
        tracing::info!(
            "Search plan: {} queries for {} regions ({} fresh in ledger)",
            queries.len(),
            regions.len(),
            fresh.len()
        );
        Ok(SearchRun {
            discovery: self,
            queries,
            fresh,
            job_id,
            next: 0,
            executed: 0,
            skipped: 0,
        })
    }
}

/// A pull-based pass over a query plan
pub struct SearchRun<'a> {
    discovery: &'a SearchDiscovery,
    queries: Vec<PlannedQuery>,
    fresh: HashSet<String>,
    job_id: Option<i64>,
    next: usize,
    executed: usize,
    skipped: usize,
}

impl SearchRun<'_> {
    pub fn total(&self) -> usize {
        self.queries.len()
    }

    pub fn executed(&self) -> usize {
        self.executed
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Runs queries until one returns URLs or the plan is exhausted
    ///
    /// Fresh queries are skipped. Executed queries are recorded in the
    /// ledger whatever they return; a backend failure is logged and left
    /// unrecorded so a later run retries it.
    pub async fn next_batch(&mut self) -> StorageResult<Option<SearchBatch>> {
        let total = self.queries.len();
        let yield_every = self.discovery.config.skip_yield_interval.max(1);

        while self.next < total {
            let index = self.next;
            self.next += 1;
            let query = self.queries[index].clone();

            if self.fresh.contains(&query.text) {
                self.skipped += 1;
                if self.skipped % yield_every == 0 {
                    tracing::debug!("Skipped {} fresh queries so far", self.skipped);
                    tokio::task::yield_now().await;
                }
                continue;
            }

            let urls = match self
                .discovery
                .backend
                .search(&query.text, self.discovery.config.results_per_query)
                .await
            {
                Ok(urls) => urls,
                Err(e) => {
                    tracing::warn!("[{}/{}] Search failed for '{}': {}", index + 1, total, query.text, e);
                    continue;
                }
            };

            self.executed += 1;
            let found = urls.len() as u32;
            self.discovery
                .ledger
                .mark_done(&query.text, found, found, self.job_id)?;

            if urls.is_empty() {
                tracing::debug!("[{}/{}] No results for '{}'", index + 1, total, query.text);
                continue;
            }

            tracing::info!("[{}/{}] Found {} URLs for '{}'", index + 1, total, urls.len(), query.text);
            return Ok(Some(SearchBatch {
                urls,
                query,
                index,
                total,
                executed: self.executed,
            }));
        }

        Ok(None)
    }
}
