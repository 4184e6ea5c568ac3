//! Crawler module for page fetching
//!
//! This module contains the network side of the harvester:
//! - Per-domain rate limiting
//! - HTTP fetching with retry logic and robots.txt gating
//! - The heavy render fallback for JavaScript shells
//! - HTML helpers shared by the processors and crawlers

mod fetcher;
mod parser;
mod rate_limiter;
mod renderer;

pub use fetcher::{build_http_client, FetchError, FetchedPage, PageFetcher};
pub use parser::{
    find_contact_link, needs_heavy_render, page_links, page_text, resolve_link, visible_text,
    PageLink,
};
pub use rate_limiter::RateLimiter;
pub use renderer::{DisabledRenderer, HeadlessRenderer, RenderError, Renderer};

use crate::config::RendererConfig;
use std::sync::Arc;
use std::time::Duration;

/// Builds the render strategy described by the `[renderer]` section
///
/// Without an endpoint the fallback is disabled.
pub fn build_renderer(config: &RendererConfig) -> Result<Arc<dyn Renderer>, reqwest::Error> {
    match &config.endpoint {
        Some(endpoint) => Ok(Arc::new(HeadlessRenderer::new(
            endpoint,
            config.launch_command.clone(),
            Duration::from_millis(config.timeout_ms),
            Duration::from_millis(config.startup_timeout_ms),
        )?)),
        None => Ok(Arc::new(DisabledRenderer)),
    }
}
