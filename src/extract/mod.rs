//! Extraction of contact details and cattle metadata from pages
//!
//! Both extractors are pure and CPU-bound. Async callers run them on the
//! blocking pool.

mod contact;
mod metadata;

pub use contact::{
    find_email, is_valid_email, normalize_phone, ContactCandidate, ContactExtractor,
};
pub use metadata::{CattleMetadata, MetadataExtractor};

/// Turns a fetched page into a contact candidate and cattle metadata
pub trait Extractor: Send + Sync {
    /// Extracts contact details from raw HTML
    fn extract(&self, html: &str, source_url: &str) -> ContactCandidate;

    /// Extracts cattle metadata from visible page text
    fn extract_metadata(&self, text: &str) -> CattleMetadata;
}

/// The regex and structured-data extractor used by the worker
#[derive(Debug, Default, Clone, Copy)]
pub struct PageExtractor {
    contacts: ContactExtractor,
    metadata: MetadataExtractor,
}

impl PageExtractor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Extractor for PageExtractor {
    fn extract(&self, html: &str, source_url: &str) -> ContactCandidate {
        self.contacts.extract(html, source_url)
    }

    fn extract_metadata(&self, text: &str) -> CattleMetadata {
        self.metadata.extract(text)
    }
}
