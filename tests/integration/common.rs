//! Shared fixtures

use cattle_harvest::config::{parse_config, Config};
use cattle_harvest::crawler::{DisabledRenderer, PageFetcher, RateLimiter, Renderer};
use cattle_harvest::robots::RobotsGate;
use cattle_harvest::storage::{open_storage, SharedStorage};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Builds a config with fast timeouts and a small US profile
///
/// The YellowPages layout and breed directory point at `mock_uri`.
pub fn test_config(mock_uri: &str) -> Config {
    let toml = format!(
        r#"
[worker]
active-countries = []
batch-size = 10
max-concurrent-requests = 4

[rate-limits]
default-interval-ms = 0

[fetcher]
request-timeout-ms = 300
robots-timeout-ms = 500
max-retries = 1
retry-backoff-ms = 10

[countries.US]
name = "United States"
regions = ["Texas", "Montana"]
top-regions = ["Texas"]
search-terms = ["cattle ranch"]
search-templates = ["{{term}} {{region}} contact email"]
directory-sites = ["yellowpages"]

[countries.US.yellowpages]
base-url = "{mock}"
path-template = "/yp?q={{term}}&loc={{region}}&page={{page}}"
terms = ["cattle ranch"]
max-pages = 3

[countries.US.associations]
breed-directories = ["{mock}/find-a-breeder"]
"#,
        mock = mock_uri
    );
    parse_config(&toml).expect("test config is valid")
}

pub fn fetcher_with(config: &Config, renderer: Arc<dyn Renderer>) -> Arc<PageFetcher> {
    let robots = Arc::new(
        RobotsGate::new(
            &config.fetcher.user_agent,
            Duration::from_millis(config.fetcher.robots_timeout_ms),
        )
        .unwrap(),
    );
    let limiter = Arc::new(RateLimiter::from_config(&config.rate_limits));
    Arc::new(PageFetcher::new(&config.fetcher, robots, limiter, renderer).unwrap())
}

pub fn fetcher(config: &Config) -> Arc<PageFetcher> {
    fetcher_with(config, Arc::new(DisabledRenderer))
}

/// Opens a fresh database in a temporary directory
pub fn temp_storage() -> (TempDir, SharedStorage) {
    let dir = TempDir::new().unwrap();
    let storage = open_storage(&dir.path().join("harvest.db")).unwrap();
    (dir, storage)
}

/// A farm page with one mailto address, padded past the shell threshold
pub fn farm_page(name: &str, email: &str) -> String {
    format!(
        r#"<html><head><title>{name} | Registered Angus Cattle</title></head>
        <body>
            <h1>{name}</h1>
            <p>We are a family owned cow-calf operation raising registered Angus
            cattle. Our herd of 250 head grazes native pasture year round and we
            sell bulls and replacement heifers every spring.</p>
            <p>Visit us at 1200 County Road 45, Lampasas, TX 76550.</p>
            <p>Call (512) 555-0142 or <a href="mailto:{email}">email us</a>.</p>
        </body></html>"#
    )
}
