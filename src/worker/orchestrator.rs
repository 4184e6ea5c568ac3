//! Worker loop: job selection, discovery phases and batch processing
//!
//! This module contains the long-running loop that coordinates every part
//! of a harvest, including:
//! - Crash recovery at startup
//! - Claiming queued jobs and running their phases
//! - Draining pending URLs when no job is queued
//! - Creating periodic full jobs for active countries
//! - Bounded concurrent processing of claimed URL batches

use crate::config::{Config, CountryProfile};
use crate::crawler::PageFetcher;
use crate::discovery::{
    AssociationCrawler, DirectoryCrawler, DiscoverySource, SearchBackend, SearchDiscovery,
};
use crate::extract::Extractor;
use crate::state::{JobType, UrlStatus};
use crate::storage::{JobProgress, JobRecord, SharedStorage, StorageResult, UrlOrigin};
use crate::worker::{ContactBook, Frontier, JobStore, QueryLedger, Shutdown, UrlProcessor};
use crate::{HarvestError, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Failure reason for a URL whose processing task died
const TASK_FAILED: &str = "worker task failed";

/// What startup recovery repaired
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub urls_reset: usize,
    pub jobs_failed: usize,
}

/// Main worker structure
pub struct Orchestrator {
    config: Arc<Config>,
    frontier: Frontier,
    jobs: JobStore,
    processor: Arc<UrlProcessor>,
    search: SearchDiscovery,
    associations: AssociationCrawler,
    directories: DirectoryCrawler,
    shutdown: Shutdown,
}

impl Orchestrator {
    /// Wires the worker components around one shared store and fetcher
    pub fn new(
        config: Arc<Config>,
        storage: SharedStorage,
        fetcher: Arc<PageFetcher>,
        backend: Arc<dyn SearchBackend>,
        extractor: Arc<dyn Extractor>,
        shutdown: Shutdown,
    ) -> Self {
        let frontier = Frontier::new(
            storage.clone(),
            config.skip_domains.clone(),
            config.worker.recovery_batch_size as usize,
        );
        let contacts = ContactBook::new(storage.clone(), Arc::new(config.countries.clone()));
        let processor = Arc::new(UrlProcessor::new(
            fetcher.clone(),
            extractor.clone(),
            frontier.clone(),
            contacts.clone(),
        ));
        let search = SearchDiscovery::new(
            backend,
            QueryLedger::new(storage.clone()),
            config.search.clone(),
        );
        let associations =
            AssociationCrawler::new(fetcher.clone(), extractor, contacts.clone(), shutdown.clone());
        let directories = DirectoryCrawler::new(fetcher, contacts, shutdown.clone());

        Self {
            config,
            frontier,
            jobs: JobStore::new(storage),
            processor,
            search,
            associations,
            directories,
            shutdown,
        }
    }

    /// Resets stuck URLs and fails jobs left running by a previous process
    pub fn recover(&self) -> StorageResult<RecoveryReport> {
        let report = RecoveryReport {
            urls_reset: self.frontier.recover_stuck()?,
            jobs_failed: self.jobs.fail_orphans()?,
        };
        if report.urls_reset > 0 || report.jobs_failed > 0 {
            tracing::info!(
                "Recovery: {} URLs reset to pending, {} orphaned jobs failed",
                report.urls_reset,
                report.jobs_failed
            );
        }
        Ok(report)
    }

    /// Runs the worker loop until shutdown is requested
    ///
    /// Only a failing recovery stops the loop; errors of a single cycle are
    /// logged and followed by a backoff sleep.
    pub async fn run(&self) -> Result<()> {
        self.recover()?;

        let idle = Duration::from_secs(self.config.worker.idle_sleep_secs);
        let backoff = Duration::from_secs(self.config.worker.error_backoff_secs);
        tracing::info!(
            "Worker started (countries: {})",
            self.config.worker.active_countries.join(", ")
        );

        while !self.shutdown.is_requested() {
            match self.tick().await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!("Nothing to do, sleeping {}s", idle.as_secs());
                    self.shutdown.sleep(idle).await;
                }
                Err(e) => {
                    tracing::error!("Worker cycle failed: {}", e);
                    self.shutdown.sleep(backoff).await;
                }
            }
        }

        tracing::info!("Worker stopped");
        Ok(())
    }

    /// Performs one cycle of the loop
    ///
    /// Returns false when there was nothing to do.
    pub async fn tick(&self) -> Result<bool> {
        if let Some(job) = self.jobs.claim_next()? {
            self.run_job(&job).await?;
            return Ok(true);
        }

        if self.frontier.count(UrlStatus::Pending, None)? > 0 {
            let progress = self.drain(None, None).await?;
            tracing::info!(
                "Drained {} pending URLs, {} contacts stored",
                progress.urls_processed,
                progress.emails_found
            );
            return Ok(true);
        }

        Ok(self.auto_create_jobs()? > 0)
    }

    /// Queues a full job for every active country without a recent one
    pub fn auto_create_jobs(&self) -> Result<usize> {
        let cooldown = chrono::Duration::hours(self.config.worker.auto_job_interval_hours as i64);
        let now = Utc::now();
        let mut created = 0;

        for country in &self.config.worker.active_countries {
            if let Some(last) = self.jobs.latest_created_at(country)? {
                if now - last < cooldown {
                    continue;
                }
            }
            let profile = self.profile(country)?;
            let total = self.search.generate_queries(profile, &profile.top_regions).len();
            self.jobs
                .create(JobType::Full, country, profile.top_regions.clone(), total as u64)?;
            created += 1;
        }

        if created > 0 {
            tracing::info!("Auto-created {} full jobs", created);
        }
        Ok(created)
    }

    /// Runs a claimed job and records its outcome
    ///
    /// A job interrupted by shutdown stays `running` for the next startup
    /// to resolve.
    pub async fn run_job(&self, job: &JobRecord) -> Result<()> {
        tracing::info!(
            "Running job {}: {} for {} ({} regions)",
            job.id,
            job.job_type,
            job.country,
            job.target_regions.len()
        );

        let outcome = self.run_phases(job).await;

        if self.shutdown.is_requested() {
            tracing::warn!("Shutdown during job {}, leaving it running", job.id);
            return Ok(());
        }

        match outcome {
            Ok(()) => self.jobs.complete(job.id)?,
            Err(e) => self.jobs.fail(job.id, &e.to_string())?,
        }
        Ok(())
    }

    async fn run_phases(&self, job: &JobRecord) -> Result<()> {
        let profile = self.profile(&job.country)?;
        let regions = if job.target_regions.is_empty() {
            profile.top_regions.clone()
        } else {
            job.target_regions.clone()
        };

        if job.job_type.runs(DiscoverySource::Search) {
            self.search_phase(job, profile, &regions).await?;
        }
        if self.shutdown.is_requested() {
            return Ok(());
        }

        if job.job_type.runs(DiscoverySource::Associations) {
            self.association_phase(job, profile, &regions).await?;
        }
        if self.shutdown.is_requested() {
            return Ok(());
        }

        let drained = self.drain(Some(&job.country), Some(job.id)).await?;
        tracing::info!("Job {}: processed {} remaining URLs", job.id, drained.urls_processed);
        if self.shutdown.is_requested() {
            return Ok(());
        }

        if job.job_type.runs(DiscoverySource::Directories) {
            self.directory_phase(job, profile, &regions).await?;
        }
        Ok(())
    }

    /// Interleaves search discovery with processing of what it found
    async fn search_phase(
        &self,
        job: &JobRecord,
        profile: &CountryProfile,
        regions: &[String],
    ) -> Result<()> {
        let per_cycle = self.config.worker.discovery_batch_size.max(1) as usize;
        let mut run = self.search.discover(profile, regions, Some(job.id))?;
        let mut drained_at = 0;

        while !self.shutdown.is_requested() {
            let Some(batch) = run.next_batch().await? else {
                break;
            };

            let origin = UrlOrigin {
                source: DiscoverySource::Search.as_str().to_string(),
                discovered_by: Some(batch.query.text.clone()),
                country: job.country.clone(),
                region_hint: Some(batch.query.region.clone()),
            };
            let added = self.frontier.enqueue(&batch.urls, &origin)?;
            tracing::info!(
                "[{}/{}] '{}': {} results, {} new",
                batch.index + 1,
                batch.total,
                batch.query.text,
                batch.urls.len(),
                added
            );
            self.jobs.add_progress(
                job.id,
                &JobProgress {
                    query_index: Some(batch.index as u64 + 1),
                    urls_discovered: added as u64,
                    ..Default::default()
                },
            )?;

            if batch.executed - drained_at >= per_cycle {
                drained_at = batch.executed;
                self.process_cycle(&job.country, job.id).await?;
            }
        }

        if !self.shutdown.is_requested() {
            self.jobs.add_progress(
                job.id,
                &JobProgress {
                    query_index: Some(run.total() as u64),
                    ..Default::default()
                },
            )?;
        }
        tracing::info!(
            "Job {}: search finished ({} executed, {} fresh skipped)",
            job.id,
            run.executed(),
            run.skipped()
        );
        Ok(())
    }

    /// Processes a bounded number of batches between search cycles
    async fn process_cycle(&self, country: &str, job_id: i64) -> StorageResult<()> {
        for _ in 0..self.config.worker.process_batches_per_cycle {
            if self.shutdown.is_requested() {
                break;
            }
            let progress = self.process_batch(Some(country)).await?;
            if progress.urls_processed == 0 {
                break;
            }
            self.jobs.add_progress(job_id, &progress)?;
        }
        Ok(())
    }

    async fn association_phase(
        &self,
        job: &JobRecord,
        profile: &CountryProfile,
        regions: &[String],
    ) -> Result<()> {
        let report = self.associations.crawl(&job.country, profile, regions).await?;
        let origin = UrlOrigin {
            source: DiscoverySource::Associations.as_str().to_string(),
            discovered_by: None,
            country: job.country.clone(),
            region_hint: None,
        };
        let added = self.frontier.enqueue(&report.urls, &origin)?;
        self.jobs.add_progress(
            job.id,
            &JobProgress {
                urls_discovered: added as u64,
                emails_found: report.contacts_saved,
                ..Default::default()
            },
        )?;
        Ok(())
    }

    async fn directory_phase(
        &self,
        job: &JobRecord,
        profile: &CountryProfile,
        regions: &[String],
    ) -> Result<()> {
        for site in &profile.directory_sites {
            if self.shutdown.is_requested() {
                break;
            }
            match self.directories.crawl(*site, &job.country, profile, regions).await {
                Ok(report) => self.jobs.add_progress(
                    job.id,
                    &JobProgress {
                        emails_found: report.contacts_saved,
                        ..Default::default()
                    },
                )?,
                Err(e) => tracing::error!("{:?} crawl failed for {}: {}", site, job.country, e),
            }
        }
        Ok(())
    }

    /// Processes batches until nothing is pending or shutdown is requested
    async fn drain(&self, country: Option<&str>, job_id: Option<i64>) -> StorageResult<JobProgress> {
        let mut total = JobProgress::default();
        while !self.shutdown.is_requested() {
            let progress = self.process_batch(country).await?;
            if progress.urls_processed == 0 {
                break;
            }
            if let Some(id) = job_id {
                self.jobs.add_progress(id, &progress)?;
            }
            total.absorb(&progress);
        }
        Ok(total)
    }

    /// Claims one batch and processes it with bounded concurrency
    ///
    /// Every claimed URL ends terminal: URLs whose task errored or panicked
    /// are marked failed here. A store error is returned only after every
    /// task of the batch has finished.
    pub async fn process_batch(&self, country: Option<&str>) -> StorageResult<JobProgress> {
        let claimed = self
            .frontier
            .claim(self.config.worker.batch_size as usize, country)?;
        if claimed.is_empty() {
            return Ok(JobProgress::default());
        }

        let semaphore = Arc::new(Semaphore::new(
            self.config.worker.max_concurrent_requests.max(1) as usize,
        ));
        let mut tasks = JoinSet::new();
        for url in claimed.iter().cloned() {
            let processor = self.processor.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = processor.process(&url).await;
                (url.url, result)
            });
        }

        let mut reported = HashSet::new();
        let mut stored = 0;
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((url, Ok(count))) => {
                    stored += count;
                    reported.insert(url);
                }
                Ok((url, Err(e))) => {
                    tracing::warn!("Processing {} failed: {}", url, e);
                    match self.frontier.mark_done(&url, 0, Some(&e.to_string())) {
                        Ok(()) => {
                            reported.insert(url);
                        }
                        Err(e) => {
                            tracing::error!("Could not mark {} failed: {}", url, e);
                            first_error.get_or_insert(e);
                        }
                    }
                }
                Err(e) => tracing::error!("URL task died: {}", e),
            }
        }

        for lost in claimed.iter().filter(|c| !reported.contains(&c.url)) {
            if let Err(e) = self.frontier.mark_done(&lost.url, 0, Some(TASK_FAILED)) {
                tracing::error!("Could not mark {} failed: {}", lost.url, e);
                first_error.get_or_insert(e);
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        tracing::debug!("Batch of {} URLs: {} contacts stored", claimed.len(), stored);
        Ok(JobProgress {
            urls_processed: claimed.len() as u64,
            emails_found: stored,
            ..Default::default()
        })
    }

    fn profile(&self, country: &str) -> Result<&CountryProfile> {
        self.config
            .country(country)
            .ok_or_else(|| HarvestError::UnknownCountry(country.to_string()))
    }
}
