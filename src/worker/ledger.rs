//! Durable record of executed discovery queries

use crate::storage::{lock, QueryRecord, SharedStorage, StorageResult};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

/// Query ledger over the shared store
///
/// A query executed at `T` is fresh strictly before `T + ttl` and eligible
/// to run again from `T + ttl` on.
#[derive(Clone)]
pub struct QueryLedger {
    storage: SharedStorage,
}

impl QueryLedger {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    /// Records an execution, refreshing `executed_at` if the query ran before
    pub fn mark_done(
        &self,
        query: &str,
        results_count: u32,
        urls_found: u32,
        job_id: Option<i64>,
    ) -> StorageResult<()> {
        self.mark_done_at(query, results_count, urls_found, job_id, Utc::now())
    }

    pub fn mark_done_at(
        &self,
        query: &str,
        results_count: u32,
        urls_found: u32,
        job_id: Option<i64>,
        executed_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let record = QueryRecord {
            query: query.to_string(),
            executed_at,
            results_count,
            urls_found,
            job_id,
        };
        lock(&self.storage)?.upsert_query(&record)
    }

    pub fn is_fresh(&self, query: &str, ttl: Duration) -> StorageResult<bool> {
        self.is_fresh_at(query, ttl, Utc::now())
    }

    pub fn is_fresh_at(&self, query: &str, ttl: Duration, now: DateTime<Utc>) -> StorageResult<bool> {
        let record = lock(&self.storage)?.get_query(query)?;
        Ok(record.map_or(false, |r| r.executed_at > now - ttl))
    }

    /// Loads every fresh query text in one read
    pub fn fresh_set(&self, ttl: Duration) -> StorageResult<HashSet<String>> {
        self.fresh_set_at(ttl, Utc::now())
    }

    pub fn fresh_set_at(&self, ttl: Duration, now: DateTime<Utc>) -> StorageResult<HashSet<String>> {
        lock(&self.storage)?.queries_executed_after(now - ttl)
    }

    pub fn count(&self) -> StorageResult<u64> {
        lock(&self.storage)?.count_queries()
    }
}
