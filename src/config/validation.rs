use crate::config::types::{Config, CountryProfile, FetcherConfig, RendererConfig, WorkerConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_worker_config(&config.worker)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_renderer_config(&config.renderer)?;
    validate_output_config(&config.output)?;

    for pattern in config.rate_limits.domains.keys() {
        validate_domain_pattern(pattern)?;
    }
    for pattern in &config.skip_domains {
        validate_domain_pattern(pattern)?;
    }

    Url::parse(&config.search.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid search base-url: {}", e)))?;

    for (code, profile) in &config.countries {
        validate_country_profile(code, profile)?;
    }

    for code in &config.worker.active_countries {
        if config.country(code).is_none() {
            return Err(ConfigError::Validation(format!(
                "Active country '{}' has no country profile",
                code
            )));
        }
    }

    Ok(())
}

fn validate_worker_config(config: &WorkerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_requests < 1 || config.max_concurrent_requests > 100 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-requests must be between 1 and 100, got {}",
            config.max_concurrent_requests
        )));
    }

    if config.batch_size < 1 {
        return Err(ConfigError::Validation(
            "batch-size must be >= 1".to_string(),
        ));
    }

    if config.recovery_batch_size < 1 {
        return Err(ConfigError::Validation(
            "recovery-batch-size must be >= 1".to_string(),
        ));
    }

    if config.discovery_batch_size < 1 {
        return Err(ConfigError::Validation(
            "discovery-batch-size must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "request-timeout-ms must be >= 100ms, got {}ms",
            config.request_timeout_ms
        )));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    if let Some(proxy) = &config.proxy_url {
        Url::parse(proxy)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy-url: {}", e)))?;
    }

    Ok(())
}

fn validate_renderer_config(config: &RendererConfig) -> Result<(), ConfigError> {
    if let Some(endpoint) = &config.endpoint {
        Url::parse(endpoint)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid renderer endpoint: {}", e)))?;
    } else if !config.launch_command.is_empty() {
        return Err(ConfigError::Validation(
            "renderer launch-command requires an endpoint".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_config(config: &crate::config::types::OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.summary_path.is_empty() {
        return Err(ConfigError::Validation(
            "summary-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_country_profile(code: &str, profile: &CountryProfile) -> Result<(), ConfigError> {
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ConfigError::Validation(format!(
            "Country code '{}' must be two uppercase letters",
            code
        )));
    }

    if profile.regions.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Country '{}' must list at least one region",
            code
        )));
    }

    for template in &profile.search_templates {
        if !template.contains("{region}") {
            return Err(ConfigError::Validation(format!(
                "Search template '{}' for '{}' lacks a {{region}} placeholder",
                template, code
            )));
        }
        if template.contains("{breed}") && profile.breeds.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Search template '{}' for '{}' uses {{breed}} but no breeds are listed",
                template, code
            )));
        }
    }

    for url in profile
        .associations
        .breed_directories
        .iter()
        .chain(profile.associations.regional.values())
    {
        Url::parse(url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid association URL '{}': {}", url, e))
        })?;
    }

    if let Some(yp) = &profile.yellowpages {
        Url::parse(&yp.base_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid yellowpages base-url '{}': {}", yp.base_url, e))
        })?;
    }

    Ok(())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    match pattern.strip_prefix("*.") {
        Some(domain) => validate_domain_string(domain),
        None => validate_domain_string(pattern),
    }
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
        || domain.contains("..")
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' is malformed",
            domain
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}
