//! Job records and their status machine

use crate::state::{JobStatus, JobType};
use crate::storage::{lock, JobProgress, JobRecord, NewJob, SharedStorage, StorageResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Failure reason given to jobs found `running` at startup
pub const ORPHAN_REASON: &str = "orphaned by worker restart";

#[derive(Clone)]
pub struct JobStore {
    storage: SharedStorage,
}

impl JobStore {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    /// Queues a job and returns its id
    pub fn create(
        &self,
        job_type: JobType,
        country: &str,
        target_regions: Vec<String>,
        total_queries: u64,
    ) -> StorageResult<i64> {
        let job = NewJob {
            job_type,
            country: country.to_string(),
            target_regions,
            total_queries,
        };
        let id = lock(&self.storage)?.insert_job(&job, Utc::now())?;
        tracing::info!(
            "Created job {}: type={}, country={}, regions={}, queries={}",
            id,
            job.job_type,
            job.country,
            job.target_regions.len(),
            job.total_queries
        );
        Ok(id)
    }

    /// Atomically moves the oldest queued job to `running`
    pub fn claim_next(&self) -> StorageResult<Option<JobRecord>> {
        lock(&self.storage)?.claim_next_job(Utc::now())
    }

    /// Adds progress deltas to a job's counters
    pub fn add_progress(&self, job_id: i64, progress: &JobProgress) -> StorageResult<()> {
        if progress.is_empty() {
            return Ok(());
        }
        lock(&self.storage)?.add_job_progress(job_id, progress)
    }

    pub fn complete(&self, job_id: i64) -> StorageResult<()> {
        lock(&self.storage)?.finish_job(job_id, JobStatus::Completed, None, Utc::now())?;
        tracing::info!("Job {} completed", job_id);
        Ok(())
    }

    pub fn fail(&self, job_id: i64, error: &str) -> StorageResult<()> {
        lock(&self.storage)?.finish_job(job_id, JobStatus::Failed, Some(error), Utc::now())?;
        tracing::warn!("Job {} failed: {}", job_id, error);
        Ok(())
    }

    /// Fails every job left `running` by a previous process
    pub fn fail_orphans(&self) -> StorageResult<usize> {
        lock(&self.storage)?.fail_running_jobs(ORPHAN_REASON, Utc::now())
    }

    pub fn get(&self, job_id: i64) -> StorageResult<JobRecord> {
        lock(&self.storage)?.get_job(job_id)
    }

    pub fn list(&self, limit: usize) -> StorageResult<Vec<JobRecord>> {
        lock(&self.storage)?.list_jobs(limit)
    }

    pub fn status_counts(&self) -> StorageResult<HashMap<JobStatus, u64>> {
        lock(&self.storage)?.job_status_counts()
    }

    pub fn latest_created_at(&self, country: &str) -> StorageResult<Option<DateTime<Utc>>> {
        lock(&self.storage)?.latest_job_created_at(country)
    }
}
