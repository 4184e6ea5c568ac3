//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::{JobStatus, UrlStatus};
use crate::storage::{
    ClaimedUrl, Contact, ContactRecord, JobProgress, JobRecord, NewJob, QueryRecord, UrlOrigin,
    UrlRecord,
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Job not found: {0}")]
    JobNotFound(i64),

    #[error("Invalid job transition for job {id}: {from} -> {to}")]
    InvalidTransition {
        id: i64,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every method is a single short operation; callers hold the shared lock
/// only for the duration of one call. Status transitions that must be
/// atomic (claiming URLs and jobs) are single statements inside an
/// immediate transaction, so they stay atomic across processes sharing
/// one database file.
pub trait Storage {
    // ===== URL Frontier =====

    /// Inserts URLs as `pending`, ignoring ones already present
    ///
    /// # Returns
    ///
    /// The number of rows actually added
    fn insert_urls(&mut self, urls: &[String], origin: &UrlOrigin) -> StorageResult<usize>;

    /// Atomically flips up to `limit` oldest pending URLs to `processing`
    ///
    /// # Arguments
    ///
    /// * `limit` - Maximum number of URLs to claim
    /// * `country` - Only claim URLs discovered for this country
    /// * `claimed_at` - Lease timestamp written to the claimed rows
    fn claim_pending_urls(
        &mut self,
        limit: usize,
        country: Option<&str>,
        claimed_at: DateTime<Utc>,
    ) -> StorageResult<Vec<ClaimedUrl>>;

    /// Sets the terminal status of a URL that is not terminal yet
    ///
    /// `error` present means `failed`, absent means `completed`.
    /// Returns false when the URL is unknown or already terminal.
    fn finish_url(
        &mut self,
        url: &str,
        emails_found: u32,
        error: Option<&str>,
        finished_at: DateTime<Utc>,
    ) -> StorageResult<bool>;

    /// Gets a URL row by its normalized URL
    fn get_url(&self, url: &str) -> StorageResult<Option<UrlRecord>>;

    /// Resets at most `batch` `processing` URLs back to `pending`
    fn reset_processing_urls(&mut self, batch: usize) -> StorageResult<usize>;

    /// Counts URLs in a status, optionally for one country
    fn count_urls_by_status(&self, status: UrlStatus, country: Option<&str>)
        -> StorageResult<u64>;

    /// Counts URLs per status
    fn url_status_counts(&self) -> StorageResult<HashMap<UrlStatus, u64>>;

    /// Gets the most recently failed URLs with their reasons
    fn recent_failures(&self, limit: usize) -> StorageResult<Vec<UrlRecord>>;

    // ===== Jobs =====

    /// Creates a queued job and returns its ID
    fn insert_job(&mut self, job: &NewJob, created_at: DateTime<Utc>) -> StorageResult<i64>;

    /// Atomically moves the oldest queued job to `running` and returns it
    fn claim_next_job(&mut self, started_at: DateTime<Utc>) -> StorageResult<Option<JobRecord>>;

    /// Gets a job by ID
    fn get_job(&self, job_id: i64) -> StorageResult<JobRecord>;

    /// Adds counter deltas to a job and optionally moves its query cursor
    fn add_job_progress(&mut self, job_id: i64, progress: &JobProgress) -> StorageResult<()>;

    /// Moves a job to a terminal status
    ///
    /// Fails with `InvalidTransition` when the job's current status does
    /// not allow it.
    fn finish_job(
        &mut self,
        job_id: i64,
        status: JobStatus,
        error: Option<&str>,
        finished_at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Marks every `running` job as failed with the given reason
    fn fail_running_jobs(&mut self, reason: &str, at: DateTime<Utc>) -> StorageResult<usize>;

    /// Lists the most recent jobs, newest first
    fn list_jobs(&self, limit: usize) -> StorageResult<Vec<JobRecord>>;

    /// Counts jobs per status
    fn job_status_counts(&self) -> StorageResult<HashMap<JobStatus, u64>>;

    /// Gets the creation time of the newest job for a country
    fn latest_job_created_at(&self, country: &str) -> StorageResult<Option<DateTime<Utc>>>;

    // ===== Query Ledger =====

    /// Inserts or refreshes a query record keyed by its literal text
    fn upsert_query(&mut self, record: &QueryRecord) -> StorageResult<()>;

    /// Gets a query record by its text
    fn get_query(&self, query: &str) -> StorageResult<Option<QueryRecord>>;

    /// Loads the text of every query executed strictly after `cutoff`
    fn queries_executed_after(&self, cutoff: DateTime<Utc>) -> StorageResult<HashSet<String>>;

    /// Counts recorded queries
    fn count_queries(&self) -> StorageResult<u64>;

    // ===== Contacts =====

    /// Inserts a contact keyed by lowercased email, or merges into the existing row
    ///
    /// Non-empty incoming fields replace stored ones; empty incoming fields
    /// keep what is stored. The first source URL is kept. Returns true when
    /// a new row was created.
    fn upsert_contact(&mut self, contact: &Contact, at: DateTime<Utc>) -> StorageResult<bool>;

    /// Returns true if any contact was saved from this source URL
    fn has_contact_from_source(&self, source_url: &str) -> StorageResult<bool>;

    /// Gets a contact by email
    fn get_contact(&self, email: &str) -> StorageResult<Option<ContactRecord>>;

    /// Counts stored contacts
    fn count_contacts(&self) -> StorageResult<u64>;

    /// Counts contacts per (country, region), largest first
    fn contact_counts_by_region(&self) -> StorageResult<Vec<(String, String, u64)>>;

    /// Lists the most recently updated contacts
    fn recent_contacts(&self, limit: usize) -> StorageResult<Vec<ContactRecord>>;
}
