//! Discovery sources that feed the frontier
//!
//! # Sources
//!
//! - `SearchDiscovery`: search-engine queries generated per country and region
//! - `AssociationCrawler`: breed association and regional membership directories
//! - `DirectoryCrawler`: business directory listing searches
//!
//! Association and directory crawls also save contacts straight from the
//! pages they fetch.

mod associations;
mod backend;
mod directories;
mod search;

pub use associations::{breeder_links, member_links, AssociationCrawler, AssociationReport};
pub use backend::{parse_result_links, DuckDuckGoHtml, SearchBackend, SearchError};
pub use directories::{
    listing_pages, parse_listings, DirectoryCrawler, DirectoryListing, DirectoryReport,
};
pub use search::{generate_queries, PlannedQuery, SearchBatch, SearchDiscovery, SearchRun};

use std::fmt;

/// The closed set of discovery sources a job can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoverySource {
    Search,
    Associations,
    Directories,
}

impl DiscoverySource {
    /// Value stored in the `source` column of frontier rows
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Associations => "association",
            Self::Directories => "directory",
        }
    }
}

impl fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Encodes a value for a query string, spaces as `+`
pub(crate) fn quote_plus(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
