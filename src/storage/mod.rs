//! Storage module for persisting harvest data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - The URL frontier and its atomic claim
//! - Job records and progress counters
//! - The query ledger
//! - Contact upserts keyed by email

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::{JobStatus, JobType, UrlStatus};
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Store handle shared by every component of one process
///
/// Constructed once at startup and dropped at shutdown; the lock is held
/// for single storage calls only.
pub type SharedStorage = Arc<Mutex<dyn Storage + Send>>;

/// Opens (or creates) the SQLite database and wraps it for sharing
pub fn open_storage(path: &Path) -> StorageResult<SharedStorage> {
    let storage = SqliteStorage::new(path)?;
    Ok(Arc::new(Mutex::new(storage)))
}

/// Wraps an already opened backend for sharing
pub fn share<S: Storage + Send + 'static>(storage: S) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Locks the shared store, mapping lock poisoning to a storage error
pub fn lock(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, dyn Storage + Send + 'static>> {
    storage.lock().map_err(|_| StorageError::LockPoisoned)
}

/// Formats a timestamp the way every table stores it
///
/// Fixed-width UTC with microseconds, so lexical order equals time order.
pub fn to_db_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a stored timestamp
pub fn from_db_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Where a batch of enqueued URLs came from
#[derive(Debug, Clone)]
pub struct UrlOrigin {
    /// Discovery source ("search", "association", ...)
    pub source: String,
    /// Query text or directory that produced the URL
    pub discovered_by: Option<String>,
    pub country: String,
    /// Region the discovery targeted, used when the page names none
    pub region_hint: Option<String>,
}

/// A URL handed to one worker by a claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedUrl {
    pub id: i64,
    pub url: String,
    pub source: String,
    pub country: String,
    pub region_hint: Option<String>,
}

/// Represents a URL row in the frontier
#[derive(Debug, Clone)]
pub struct UrlRecord {
    pub id: i64,
    pub url: String,
    pub status: UrlStatus,
    pub source: String,
    pub discovered_by: Option<String>,
    pub country: String,
    pub region_hint: Option<String>,
    pub emails_found: u32,
    pub error: Option<String>,
    pub created_at: String,
    pub claimed_at: Option<String>,
    pub processed_at: Option<String>,
}

/// Parameters of a job to create
#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_type: JobType,
    pub country: String,
    pub target_regions: Vec<String>,
    pub total_queries: u64,
}

/// Represents a job row
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: i64,
    pub job_type: JobType,
    pub country: String,
    pub target_regions: Vec<String>,
    pub status: JobStatus,
    pub query_index: u64,
    pub total_queries: u64,
    pub urls_discovered: u64,
    pub urls_processed: u64,
    pub emails_found: u64,
    pub error: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

/// Counter increments applied to a job after a unit of work
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobProgress {
    /// New position of the query cursor, if it moved
    pub query_index: Option<u64>,
    pub urls_discovered: u64,
    pub urls_processed: u64,
    pub emails_found: u64,
}

impl JobProgress {
    /// Returns true if applying this progress would change nothing
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Adds another progress delta into this one
    pub fn absorb(&mut self, other: &JobProgress) {
        if other.query_index.is_some() {
            self.query_index = other.query_index;
        }
        self.urls_discovered += other.urls_discovered;
        self.urls_processed += other.urls_processed;
        self.emails_found += other.emails_found;
    }
}

/// Represents a query ledger row
#[derive(Debug, Clone)]
pub struct QueryRecord {
    pub query: String,
    pub executed_at: DateTime<Utc>,
    pub results_count: u32,
    pub urls_found: u32,
    pub job_id: Option<i64>,
}

/// A contact to store; empty fields are `None`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contact {
    pub email: String,
    pub farm_name: Option<String>,
    pub owner_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: String,
    pub website: Option<String>,
    pub social_links: Vec<String>,
    pub cattle_type: Option<String>,
    pub breed: Option<String>,
    pub head_count: Option<u32>,
    pub source_url: String,
}

/// A stored contact with its timestamps
#[derive(Debug, Clone)]
pub struct ContactRecord {
    pub contact: Contact,
    pub created_at: String,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_roundtrip() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 5).unwrap();
        let s = to_db_timestamp(at);
        assert_eq!(s, "2026-03-01T12:30:05.000000Z");
        assert_eq!(from_db_timestamp(&s), Some(at));
    }

    #[test]
    fn test_timestamps_sort_lexically() {
        let a = Utc.with_ymd_and_hms(2026, 1, 9, 23, 59, 59).unwrap();
        let b = a + chrono::Duration::microseconds(1);
        assert!(to_db_timestamp(a) < to_db_timestamp(b));
    }

    #[test]
    fn test_job_progress_absorb() {
        let mut total = JobProgress::default();
        assert!(total.is_empty());

        total.absorb(&JobProgress {
            query_index: Some(4),
            urls_discovered: 10,
            ..Default::default()
        });
        total.absorb(&JobProgress {
            urls_processed: 3,
            emails_found: 2,
            ..Default::default()
        });

        assert_eq!(total.query_index, Some(4));
        assert_eq!(total.urls_discovered, 10);
        assert_eq!(total.urls_processed, 3);
        assert_eq!(total.emails_found, 2);
    }
}
