use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for the harvester
///
/// Every section is optional; missing values fall back to the production
/// defaults. Country profiles are merged over the built-in catalog when the
/// file is loaded.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default, rename = "rate-limits")]
    pub rate_limits: RateLimitConfig,

    #[serde(default)]
    pub fetcher: FetcherConfig,

    #[serde(default)]
    pub renderer: RendererConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub output: OutputConfig,

    /// Domain patterns whose pages are never queued (news, social, government...)
    #[serde(default = "default_skip_domains", rename = "skip-domains")]
    pub skip_domains: Vec<String>,

    /// Country profiles keyed by country code
    #[serde(default)]
    pub countries: BTreeMap<String, CountryProfile>,
}

impl Config {
    /// Looks up the profile of a country code
    pub fn country(&self, code: &str) -> Option<&CountryProfile> {
        self.countries.get(code)
    }
}

/// Worker loop and batching configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Countries that get a job created automatically when the worker is idle
    #[serde(rename = "active-countries", default = "default_active_countries")]
    pub active_countries: Vec<String>,

    /// Number of URLs claimed per processing batch
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: u32,

    /// Maximum number of fetches in flight within one batch
    #[serde(
        rename = "max-concurrent-requests",
        default = "default_max_concurrent"
    )]
    pub max_concurrent_requests: u32,

    /// Sleep between loop iterations when there is nothing to do (seconds)
    #[serde(rename = "idle-sleep-secs", default = "default_idle_sleep")]
    pub idle_sleep_secs: u64,

    /// Sleep after an unexpected loop error (seconds)
    #[serde(rename = "error-backoff-secs", default = "default_error_backoff")]
    pub error_backoff_secs: u64,

    /// Executed discovery queries between two processing bursts
    #[serde(rename = "discovery-batch-size", default = "default_discovery_batch")]
    pub discovery_batch_size: u32,

    /// URL batches drained per processing burst during discovery
    #[serde(
        rename = "process-batches-per-cycle",
        default = "default_batches_per_cycle"
    )]
    pub process_batches_per_cycle: u32,

    /// Rows reset per statement during stuck-URL recovery
    #[serde(rename = "recovery-batch-size", default = "default_recovery_batch")]
    pub recovery_batch_size: u32,

    /// Minimum age of a country's last job before another one is auto-created (hours)
    #[serde(rename = "auto-job-interval-hours", default = "default_auto_job_interval")]
    pub auto_job_interval_hours: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            active_countries: default_active_countries(),
            batch_size: default_batch_size(),
            max_concurrent_requests: default_max_concurrent(),
            idle_sleep_secs: default_idle_sleep(),
            error_backoff_secs: default_error_backoff(),
            discovery_batch_size: default_discovery_batch(),
            process_batches_per_cycle: default_batches_per_cycle(),
            recovery_batch_size: default_recovery_batch(),
            auto_job_interval_hours: default_auto_job_interval(),
        }
    }
}

/// Per-domain request spacing
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Minimum time between requests to one domain (milliseconds)
    #[serde(rename = "default-interval-ms", default = "default_interval_ms")]
    pub default_interval_ms: u64,

    /// Overrides keyed by domain pattern ("example.com" or "*.example.com")
    #[serde(default = "default_domain_intervals")]
    pub domains: BTreeMap<String, u64>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_interval_ms: default_interval_ms(),
            domains: default_domain_intervals(),
        }
    }
}

/// HTTP fetch behavior
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Identifies the harvester in robots.txt requests and rule matching
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    #[serde(rename = "request-timeout-ms", default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    #[serde(rename = "robots-timeout-ms", default = "default_robots_timeout")]
    pub robots_timeout_ms: u64,

    /// Retries after the first attempt for 429, 5xx and transport errors
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Base of the exponential backoff (milliseconds)
    #[serde(rename = "retry-backoff-ms", default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Rotating proxy; when set, local rate limiting is skipped
    #[serde(rename = "proxy-url", default)]
    pub proxy_url: Option<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_timeout_ms: default_request_timeout(),
            robots_timeout_ms: default_robots_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
            proxy_url: None,
        }
    }
}

/// Headless render engine used as fetch fallback
#[derive(Debug, Clone, Deserialize)]
pub struct RendererConfig {
    /// Base URL of the render endpoint; the fallback is disabled when absent
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Command that starts the engine on first use (program followed by arguments)
    #[serde(rename = "launch-command", default)]
    pub launch_command: Vec<String>,

    #[serde(rename = "timeout-ms", default = "default_render_timeout")]
    pub timeout_ms: u64,

    /// How long to wait for a launched engine to accept requests
    #[serde(rename = "startup-timeout-ms", default = "default_render_startup")]
    pub startup_timeout_ms: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            launch_command: Vec::new(),
            timeout_ms: default_render_timeout(),
            startup_timeout_ms: default_render_startup(),
        }
    }
}

/// Search discovery settings
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// HTML search endpoint
    #[serde(rename = "base-url", default = "default_search_url")]
    pub base_url: String,

    #[serde(rename = "results-per-query", default = "default_results_per_query")]
    pub results_per_query: usize,

    /// Days before an executed query becomes eligible again
    #[serde(rename = "query-ttl-days", default = "default_query_ttl")]
    pub query_ttl_days: u32,

    /// Breeds expanded per `{breed}` template
    #[serde(rename = "breed-variants", default = "default_breed_variants")]
    pub breed_variants: usize,

    /// Skipped queries between two scheduler yields
    #[serde(rename = "skip-yield-interval", default = "default_skip_yield")]
    pub skip_yield_interval: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_url(),
            results_per_query: default_results_per_query(),
            query_ttl_days: default_query_ttl(),
            breed_variants: default_breed_variants(),
            skip_yield_interval: default_skip_yield(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,

    /// Path to the markdown summary file
    #[serde(rename = "summary-path", default = "default_summary_path")]
    pub summary_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            summary_path: default_summary_path(),
        }
    }
}

/// Everything the harvester knows about one country
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CountryProfile {
    pub name: String,

    /// All regions (states, provinces, counties) of the country
    pub regions: Vec<String>,

    /// Regions targeted by automatically created jobs
    pub top_regions: Vec<String>,

    pub search_terms: Vec<String>,

    /// Query templates with `{term}`, `{region}` and optional `{breed}` placeholders
    pub search_templates: Vec<String>,

    #[serde(default)]
    pub breeds: Vec<String>,

    #[serde(default)]
    pub directory_sites: Vec<DirectorySite>,

    #[serde(default)]
    pub yellowpages: Option<YellowPagesProfile>,

    #[serde(default)]
    pub associations: AssociationProfile,
}

impl CountryProfile {
    /// Returns the canonical spelling of a region name, ignoring case
    pub fn canonical_region(&self, raw: &str) -> Option<&str> {
        let wanted = raw.trim();
        self.regions
            .iter()
            .find(|r| r.eq_ignore_ascii_case(wanted))
            .map(String::as_str)
    }
}

/// Business directory sites crawled during the directory phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectorySite {
    YellowPages,
    Yelp,
    Manta,
}

/// Country-specific YellowPages search layout
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct YellowPagesProfile {
    pub base_url: String,

    /// Path and query with `{term}`, `{region}` and `{page}` placeholders
    pub path_template: String,

    pub terms: Vec<String>,

    #[serde(default = "default_directory_pages")]
    pub max_pages: u32,
}

/// Association directories crawled during the association phase
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AssociationProfile {
    /// Breed association "find a breeder" pages
    #[serde(default)]
    pub breed_directories: Vec<String>,

    /// Regional cattlemen association sites keyed by region
    #[serde(default)]
    pub regional: BTreeMap<String, String>,

    /// Paths tried on each regional site, in order
    #[serde(default = "default_member_paths")]
    pub member_paths: Vec<String>,
}

impl Default for AssociationProfile {
    fn default() -> Self {
        Self {
            breed_directories: Vec::new(),
            regional: BTreeMap::new(),
            member_paths: default_member_paths(),
        }
    }
}

fn default_active_countries() -> Vec<String> {
    ["US", "NZ", "UK", "CA", "AU"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_batch_size() -> u32 {
    100
}

fn default_max_concurrent() -> u32 {
    10
}

fn default_idle_sleep() -> u64 {
    30
}

fn default_error_backoff() -> u64 {
    10
}

fn default_discovery_batch() -> u32 {
    10
}

fn default_batches_per_cycle() -> u32 {
    3
}

fn default_recovery_batch() -> u32 {
    200
}

fn default_auto_job_interval() -> u64 {
    24
}

fn default_interval_ms() -> u64 {
    2000
}

fn default_domain_intervals() -> BTreeMap<String, u64> {
    let mut domains = BTreeMap::new();
    for search in ["*.duckduckgo.com", "*.google.com"] {
        domains.insert(search.to_string(), 1000);
    }
    for directory in [
        "*.yellowpages.com",
        "*.yelp.com",
        "*.manta.com",
        "*.yellow.co.nz",
        "*.yell.com",
        "*.yellowpages.ca",
        "*.yellowpages.com.au",
    ] {
        domains.insert(directory.to_string(), 3000);
    }
    domains
}

fn default_user_agent() -> String {
    "CattleScraper/1.0".to_string()
}

fn default_request_timeout() -> u64 {
    30_000
}

fn default_robots_timeout() -> u64 {
    10_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    2000
}

fn default_render_timeout() -> u64 {
    20_000
}

fn default_render_startup() -> u64 {
    15_000
}

fn default_search_url() -> String {
    "https://html.duckduckgo.com/html/".to_string()
}

fn default_results_per_query() -> usize {
    20
}

fn default_query_ttl() -> u32 {
    30
}

fn default_breed_variants() -> usize {
    10
}

fn default_skip_yield() -> usize {
    500
}

fn default_database_path() -> String {
    "cattle_harvest.db".to_string()
}

fn default_summary_path() -> String {
    "harvest_summary.md".to_string()
}

fn default_directory_pages() -> u32 {
    3
}

fn default_member_paths() -> Vec<String> {
    [
        "/members",
        "/directory",
        "/member-directory",
        "/find-a-member",
        "/ranchers",
        "/producers",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_skip_domains() -> Vec<String> {
    [
        // News and media
        "denverpost.com",
        "westword.com",
        "nytimes.com",
        "washingtonpost.com",
        "cnn.com",
        "bbc.com",
        "bbc.co.uk",
        "reuters.com",
        "theguardian.com",
        "independent.co.uk",
        "telegraph.co.uk",
        "dailymail.co.uk",
        "abc.net.au",
        "smh.com.au",
        "stuff.co.nz",
        "nzherald.co.nz",
        "cbc.ca",
        "globalnews.ca",
        "ctvnews.ca",
        "usatoday.com",
        "apnews.com",
        "foxnews.com",
        "nbcnews.com",
        // Social, forums and blogs
        "reddit.com",
        "quora.com",
        "facebook.com",
        "twitter.com",
        "instagram.com",
        "youtube.com",
        "linkedin.com",
        "tiktok.com",
        "pinterest.com",
        "tumblr.com",
        "medium.com",
        "wordpress.com",
        "blogspot.com",
        "blogger.com",
        // Government
        "usda.gov",
        "epa.gov",
        "fda.gov",
        "irs.gov",
        "colorado.gov",
        "texas.gov",
        "nebraska.gov",
        "gov.uk",
        "gov.au",
        "govt.nz",
        "canada.ca",
        // Classifieds and listings
        "craigslist.org",
        "ebay.com",
        "amazon.com",
        "walmart.com",
        "indeed.com",
        "glassdoor.com",
        "zillow.com",
        "realtor.com",
        "realestate.com.au",
        "trademe.co.nz",
        "rightmove.co.uk",
        // Reference
        "wikipedia.org",
        "wikimedia.org",
        "archive.org",
    ]
    .iter()
    .map(|d| format!("*.{}", d))
    .collect()
}
