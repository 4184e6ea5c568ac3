//! Turning extracted candidates into stored contacts

use crate::config::CountryProfile;
use crate::extract::{CattleMetadata, ContactCandidate};
use crate::storage::{lock, Contact, SharedStorage, StorageResult};
use crate::worker::frontier_key;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Country whose region names are rejected as foreign elsewhere
const REFERENCE_COUNTRY: &str = "US";

/// Source URLs are stored as frontier keys so a later claim of the same
/// page finds them
fn source_key(url: &str) -> String {
    frontier_key(url).unwrap_or_else(|| url.to_string())
}

/// Contact writer with per-country region validation
#[derive(Clone)]
pub struct ContactBook {
    storage: SharedStorage,
    countries: Arc<BTreeMap<String, CountryProfile>>,
}

impl ContactBook {
    pub fn new(storage: SharedStorage, countries: Arc<BTreeMap<String, CountryProfile>>) -> Self {
        Self { storage, countries }
    }

    /// Checks an extracted region against the contact's country
    ///
    /// | Input | Result |
    /// |-------|--------|
    /// | Known region (any case) | Canonical spelling |
    /// | Two-letter code, non-US country | Dropped |
    /// | US state name, non-US country | Dropped |
    /// | Anything else | Kept as-is |
    pub fn validate_region(&self, country: &str, raw: Option<&str>) -> Option<String> {
        let raw = raw.map(str::trim).filter(|r| !r.is_empty())?;

        let profile = match self.countries.get(country) {
            Some(profile) if !profile.regions.is_empty() => profile,
            _ => return Some(raw.to_string()),
        };

        if let Some(canonical) = profile.canonical_region(raw) {
            return Some(canonical.to_string());
        }

        if country != REFERENCE_COUNTRY {
            if raw.len() == 2 && raw.chars().all(|c| c.is_ascii_alphabetic()) {
                return None;
            }
            let is_us_region = self
                .countries
                .get(REFERENCE_COUNTRY)
                .and_then(|us| us.canonical_region(raw))
                .is_some();
            if is_us_region {
                return None;
            }
        }

        Some(raw.to_string())
    }

    /// Builds one contact per email of a candidate
    ///
    /// `region` takes precedence over the region found on the page.
    pub fn build_contacts(
        &self,
        candidate: &ContactCandidate,
        metadata: Option<&CattleMetadata>,
        country: &str,
        region: Option<&str>,
    ) -> Vec<Contact> {
        let region = self.validate_region(country, region.or(candidate.region.as_deref()));
        let base = Contact {
            email: String::new(),
            farm_name: candidate.farm_name.clone(),
            owner_name: candidate.owner_name.clone(),
            phone: candidate.phones.first().cloned(),
            address: candidate.address.clone(),
            city: candidate.city.clone(),
            region,
            postal_code: candidate.postal_code.clone(),
            country: country.to_string(),
            website: candidate.website.clone(),
            social_links: candidate.social_links.clone(),
            cattle_type: metadata.and_then(|m| m.cattle_type.clone()),
            breed: metadata.and_then(CattleMetadata::breed_list),
            head_count: metadata.and_then(|m| m.head_count),
            source_url: source_key(&candidate.source_url),
        };

        candidate
            .emails
            .iter()
            .map(|email| Contact {
                email: email.clone(),
                ..base.clone()
            })
            .collect()
    }

    /// Upserts contacts and returns how many were stored
    pub fn save(&self, contacts: &[Contact]) -> StorageResult<u64> {
        if contacts.is_empty() {
            return Ok(0);
        }
        let now = Utc::now();
        let mut storage = lock(&self.storage)?;
        let mut stored = 0;
        for contact in contacts {
            let is_new = storage.upsert_contact(contact, now)?;
            tracing::debug!(
                "{} contact {} | {} | {}",
                if is_new { "Saved" } else { "Refreshed" },
                contact.farm_name.as_deref().unwrap_or("?"),
                contact.email,
                contact.region.as_deref().unwrap_or("?")
            );
            stored += 1;
        }
        Ok(stored)
    }

    /// Returns true if a stored contact was harvested from this exact URL
    pub fn has_contact_from_source(&self, url: &str) -> StorageResult<bool> {
        lock(&self.storage)?.has_contact_from_source(&source_key(url))
    }

    pub fn count(&self) -> StorageResult<u64> {
        lock(&self.storage)?.count_contacts()
    }
}
