use crate::config::countries::merge_countries;
use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Environment variable holding a ScraperAPI key
pub const PROXY_KEY_ENV: &str = "SCRAPER_API_KEY";

/// Parses configuration text, merges the country catalog and validates it
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let mut config: Config = toml::from_str(content)?;

    let overrides = std::mem::take(&mut config.countries);
    config.countries = merge_countries(overrides)?;
    config.worker.active_countries = config
        .worker
        .active_countries
        .iter()
        .map(|c| c.trim().to_uppercase())
        .collect();

    validate(&config)?;

    Ok(config)
}

/// Loads and parses a configuration file from the given path
///
/// A `SCRAPER_API_KEY` environment variable enables the rotating proxy
/// when the file does not set `proxy-url` itself.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use cattle_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Batch size: {}", config.worker.batch_size);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config = parse_config(&content)?;

    if config.fetcher.proxy_url.is_none() {
        if let Ok(key) = std::env::var(PROXY_KEY_ENV) {
            if !key.trim().is_empty() {
                config.fetcher.proxy_url = Some(scraper_api_proxy(key.trim()));
            }
        }
    }

    Ok(config)
}

/// Builds the ScraperAPI proxy URL for an API key
pub fn scraper_api_proxy(key: &str) -> String {
    format!("http://scraperapi:{}@proxy-server.scraperapi.com:8001", key)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so runs can be matched to the settings they used.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
