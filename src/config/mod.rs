//! Configuration module
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and carries the built-in catalog of country profiles.
//!
//! # Example
//!
//! ```no_run
//! use cattle_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Active countries: {:?}", config.worker.active_countries);
//! ```

mod countries;
mod parser;
mod types;
mod validation;

pub use countries::builtin_countries;
pub use types::{
    AssociationProfile, Config, CountryProfile, DirectorySite, FetcherConfig, OutputConfig,
    RateLimitConfig, RendererConfig, SearchConfig, WorkerConfig, YellowPagesProfile,
};

pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, parse_config, scraper_api_proxy,
    PROXY_KEY_ENV,
};
