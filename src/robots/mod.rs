//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching
//! robots.txt files. Every page fetch is checked against the rules of its
//! origin before any request goes out.

mod gate;
mod parser;

pub use gate::RobotsGate;
pub use parser::{product_token, ParsedRobots};

use reqwest::{Client, StatusCode};

/// Fetches robots.txt for an origin
///
/// Never fails: transport errors and non-200 answers yield a permissive
/// result.
///
/// # Arguments
///
/// * `client` - HTTP client configured with the robots timeout and user agent
/// * `origin` - `scheme://host[:port]` of the site
pub async fn fetch_robots(client: &Client, origin: &str) -> ParsedRobots {
    let robots_url = format!("{}/robots.txt", origin);

    let response = match client.get(&robots_url).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("Could not fetch {}: {}", robots_url, e);
            return ParsedRobots::allow_all();
        }
    };

    if response.status() != StatusCode::OK {
        tracing::debug!("{} answered {}, allowing all", robots_url, response.status());
        return ParsedRobots::allow_all();
    }

    match response.text().await {
        Ok(body) => ParsedRobots::from_content(&body),
        Err(e) => {
            tracing::debug!("Could not read {}: {}", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}
