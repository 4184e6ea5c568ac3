//! Robots.txt rule evaluation
//!
//! Rules are matched with the robotstxt crate (Google's matcher port).

use robotstxt::DefaultMatcher;

/// Parsed robots.txt data for one origin
///
/// `None` content means everything is allowed: the file was missing,
/// unreachable or answered with a non-200 status.
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    content: Option<String>,
}

impl ParsedRobots {
    /// Wraps the raw robots.txt body of an origin
    pub fn from_content(content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    pub fn allow_all() -> Self {
        Self { content: None }
    }

    /// Returns true when no rules apply at all
    pub fn is_allow_all(&self) -> bool {
        self.content.as_deref().map_or(true, |c| c.trim().is_empty())
    }

    /// Checks if a URL is allowed for the given product token
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL or path to check
    /// * `product_token` - Robots product token (e.g. "CattleScraper")
    pub fn is_allowed(&self, url: &str, product_token: &str) -> bool {
        match self.content.as_deref() {
            None => true,
            Some(content) if content.trim().is_empty() => true,
            Some(content) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, product_token, url)
            }
        }
    }
}

/// Extracts the robots product token from a full user agent string
///
/// "CattleScraper/1.0" becomes "CattleScraper".
pub fn product_token(user_agent: &str) -> &str {
    let token = user_agent
        .split(|c: char| c == '/' || c.is_whitespace())
        .next()
        .unwrap_or(user_agent);
    if token.is_empty() {
        user_agent
    } else {
        token
    }
}
