//! Worker loop end to end against mock farm sites

use crate::common::{farm_page, fetcher, temp_storage, test_config};
use async_trait::async_trait;
use cattle_harvest::discovery::{SearchBackend, SearchError};
use cattle_harvest::extract::PageExtractor;
use cattle_harvest::state::{JobStatus, JobType, UrlStatus};
use cattle_harvest::storage::{
    lock, share, ClaimedUrl, Contact, ContactRecord, JobProgress, JobRecord, NewJob, QueryRecord,
    SharedStorage, SqliteStorage, Storage, StorageError, StorageResult, UrlOrigin, UrlRecord,
};
use cattle_harvest::worker::{Frontier, JobStore, Orchestrator, QueryLedger, Shutdown};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Returns the same URLs for every query and counts calls
struct FixedResults {
    urls: Vec<String>,
    calls: AtomicUsize,
}

#[async_trait]
impl SearchBackend for FixedResults {
    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<String>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.urls.iter().take(max_results).cloned().collect())
    }
}

async fn mount_farms(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/lazy-k"))
        .respond_with(ResponseTemplate::new(200).set_body_string(farm_page("Lazy K Ranch", "owner@lazyk-test.com")))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bar-s"))
        .respond_with(ResponseTemplate::new(200).set_body_string(farm_page("Bar S Cattle", "sales@bars-test.com")))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(server)
        .await;
}

fn orchestrator(
    server: &MockServer,
    storage: SharedStorage,
    backend: Arc<FixedResults>,
) -> Orchestrator {
    let config = test_config(&server.uri());
    let fetcher = fetcher(&config);
    Orchestrator::new(
        Arc::new(config),
        storage,
        fetcher,
        backend,
        Arc::new(PageExtractor::new()),
        Shutdown::new(),
    )
}

#[tokio::test]
async fn test_search_job_end_to_end() {
    let server = MockServer::start().await;
    mount_farms(&server).await;

    let urls: Vec<String> = ["/lazy-k", "/bar-s", "/slow"]
        .iter()
        .map(|p| format!("{}{}", server.uri(), p))
        .collect();
    let backend = Arc::new(FixedResults {
        urls: urls.clone(),
        calls: AtomicUsize::new(0),
    });

    let (_dir, storage) = temp_storage();
    let jobs = JobStore::new(storage.clone());
    let job_id = jobs
        .create(JobType::Search, "US", vec!["Texas".to_string()], 1)
        .unwrap();

    let worker = orchestrator(&server, storage.clone(), backend.clone());
    assert!(worker.tick().await.unwrap());

    let job = jobs.get(job_id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.query_index, 1);
    assert_eq!(job.urls_discovered, 3);
    assert_eq!(job.urls_processed, 3);
    assert_eq!(job.emails_found, 2);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

    let store = lock(&storage).unwrap();
    let lazy = store.get_url(&urls[0]).unwrap().unwrap();
    assert_eq!(lazy.status, UrlStatus::Completed);
    assert_eq!(lazy.emails_found, 1);
    let slow = store.get_url(&urls[2]).unwrap().unwrap();
    assert_eq!(slow.status, UrlStatus::Failed);
    assert_eq!(slow.error.as_deref(), Some("Request timeout"));

    assert_eq!(store.count_contacts().unwrap(), 2);
    let contact = store.get_contact("owner@lazyk-test.com").unwrap().unwrap().contact;
    assert_eq!(contact.country, "US");
    // The page's own state wins over the query region
    assert_eq!(contact.region.as_deref(), Some("TX"));
    assert_eq!(contact.phone.as_deref(), Some("(512) 555-0142"));
    assert_eq!(contact.source_url, urls[0]);
    assert_eq!(store.count_urls_by_status(UrlStatus::Processing, None).unwrap(), 0);
}

#[tokio::test]
async fn test_fresh_queries_are_not_repeated() {
    let server = MockServer::start().await;
    let backend = Arc::new(FixedResults {
        urls: vec![],
        calls: AtomicUsize::new(0),
    });

    let (_dir, storage) = temp_storage();
    QueryLedger::new(storage.clone())
        .mark_done("cattle ranch Texas contact email", 4, 4, None)
        .unwrap();
    let jobs = JobStore::new(storage.clone());
    let job_id = jobs
        .create(JobType::Search, "US", vec!["Texas".to_string(), "Montana".to_string()], 2)
        .unwrap();

    let worker = orchestrator(&server, storage, backend.clone());
    worker.tick().await.unwrap();

    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    assert_eq!(jobs.get(job_id).unwrap().status, JobStatus::Completed);
}

#[tokio::test]
async fn test_idle_drain_processes_pending_urls() {
    let server = MockServer::start().await;
    mount_farms(&server).await;
    let backend = Arc::new(FixedResults {
        urls: vec![],
        calls: AtomicUsize::new(0),
    });

    let (_dir, storage) = temp_storage();
    let worker = orchestrator(&server, storage.clone(), backend);
    let frontier = Frontier::new(storage.clone(), vec![], 100);
    frontier
        .enqueue(
            &[format!("{}/bar-s", server.uri())],
            &UrlOrigin {
                source: "association".to_string(),
                discovered_by: None,
                country: "US".to_string(),
                region_hint: None,
            },
        )
        .unwrap();

    assert!(worker.tick().await.unwrap());
    assert_eq!(frontier.count(UrlStatus::Completed, None).unwrap(), 1);
    assert_eq!(lock(&storage).unwrap().count_contacts().unwrap(), 1);

    // Nothing queued, nothing pending, no active countries
    assert!(!worker.tick().await.unwrap());
}

/// A store that cannot finish URLs whose path contains `/broken`
struct BrokenFinish {
    inner: SqliteStorage,
}

impl Storage for BrokenFinish {
    fn insert_urls(&mut self, urls: &[String], origin: &UrlOrigin) -> StorageResult<usize> {
        self.inner.insert_urls(urls, origin)
    }

    fn claim_pending_urls(
        &mut self,
        limit: usize,
        country: Option<&str>,
        claimed_at: DateTime<Utc>,
    ) -> StorageResult<Vec<ClaimedUrl>> {
        self.inner.claim_pending_urls(limit, country, claimed_at)
    }

    fn finish_url(
        &mut self,
        url: &str,
        emails_found: u32,
        error: Option<&str>,
        finished_at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        if url.contains("/broken") {
            return Err(StorageError::Database("disk I/O error".to_string()));
        }
        self.inner.finish_url(url, emails_found, error, finished_at)
    }

    fn get_url(&self, url: &str) -> StorageResult<Option<UrlRecord>> {
        self.inner.get_url(url)
    }

    fn reset_processing_urls(&mut self, batch: usize) -> StorageResult<usize> {
        self.inner.reset_processing_urls(batch)
    }

    fn count_urls_by_status(&self, status: UrlStatus, country: Option<&str>) -> StorageResult<u64> {
        self.inner.count_urls_by_status(status, country)
    }

    fn url_status_counts(&self) -> StorageResult<HashMap<UrlStatus, u64>> {
        self.inner.url_status_counts()
    }

    fn recent_failures(&self, limit: usize) -> StorageResult<Vec<UrlRecord>> {
        self.inner.recent_failures(limit)
    }

    fn insert_job(&mut self, job: &NewJob, created_at: DateTime<Utc>) -> StorageResult<i64> {
        self.inner.insert_job(job, created_at)
    }

    fn claim_next_job(&mut self, started_at: DateTime<Utc>) -> StorageResult<Option<JobRecord>> {
        self.inner.claim_next_job(started_at)
    }

    fn get_job(&self, job_id: i64) -> StorageResult<JobRecord> {
        self.inner.get_job(job_id)
    }

    fn add_job_progress(&mut self, job_id: i64, progress: &JobProgress) -> StorageResult<()> {
        self.inner.add_job_progress(job_id, progress)
    }

    fn finish_job(
        &mut self,
        job_id: i64,
        status: JobStatus,
        error: Option<&str>,
        finished_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.inner.finish_job(job_id, status, error, finished_at)
    }

    fn fail_running_jobs(&mut self, reason: &str, at: DateTime<Utc>) -> StorageResult<usize> {
        self.inner.fail_running_jobs(reason, at)
    }

    fn list_jobs(&self, limit: usize) -> StorageResult<Vec<JobRecord>> {
        self.inner.list_jobs(limit)
    }

    fn job_status_counts(&self) -> StorageResult<HashMap<JobStatus, u64>> {
        self.inner.job_status_counts()
    }

    fn latest_job_created_at(&self, country: &str) -> StorageResult<Option<DateTime<Utc>>> {
        self.inner.latest_job_created_at(country)
    }

    fn upsert_query(&mut self, record: &QueryRecord) -> StorageResult<()> {
        self.inner.upsert_query(record)
    }

    fn get_query(&self, query: &str) -> StorageResult<Option<QueryRecord>> {
        self.inner.get_query(query)
    }

    fn queries_executed_after(&self, cutoff: DateTime<Utc>) -> StorageResult<HashSet<String>> {
        self.inner.queries_executed_after(cutoff)
    }

    fn count_queries(&self) -> StorageResult<u64> {
        self.inner.count_queries()
    }

    fn upsert_contact(&mut self, contact: &Contact, at: DateTime<Utc>) -> StorageResult<bool> {
        self.inner.upsert_contact(contact, at)
    }

    fn has_contact_from_source(&self, source_url: &str) -> StorageResult<bool> {
        self.inner.has_contact_from_source(source_url)
    }

    fn get_contact(&self, email: &str) -> StorageResult<Option<ContactRecord>> {
        self.inner.get_contact(email)
    }

    fn count_contacts(&self) -> StorageResult<u64> {
        self.inner.count_contacts()
    }

    fn contact_counts_by_region(&self) -> StorageResult<Vec<(String, String, u64)>> {
        self.inner.contact_counts_by_region()
    }

    fn recent_contacts(&self, limit: usize) -> StorageResult<Vec<ContactRecord>> {
        self.inner.recent_contacts(limit)
    }
}

#[tokio::test]
async fn test_store_error_does_not_abort_batch() {
    let server = MockServer::start().await;
    for (route, email) in [("/lazy-k", "owner@lazyk-test.com"), ("/bar-s", "sales@bars-test.com")] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(farm_page("Test Ranch", email))
                    .set_delay(Duration::from_millis(150)),
            )
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let storage = share(BrokenFinish {
        inner: SqliteStorage::new(&dir.path().join("harvest.db")).unwrap(),
    });
    let urls: Vec<String> = ["/broken", "/lazy-k", "/bar-s"]
        .iter()
        .map(|p| format!("{}{}", server.uri(), p))
        .collect();
    Frontier::new(storage.clone(), vec![], 100)
        .enqueue(
            &urls,
            &UrlOrigin {
                source: "search".to_string(),
                discovered_by: None,
                country: "US".to_string(),
                region_hint: None,
            },
        )
        .unwrap();

    let backend = Arc::new(FixedResults {
        urls: vec![],
        calls: AtomicUsize::new(0),
    });
    let worker = orchestrator(&server, storage.clone(), backend);

    // The broken URL fails fast while the farms are still in flight
    let error = worker.process_batch(None).await.unwrap_err();
    assert!(error.to_string().contains("disk I/O error"));

    let store = lock(&storage).unwrap();
    for url in &urls[1..] {
        let record = store.get_url(url).unwrap().unwrap();
        assert_eq!(record.status, UrlStatus::Completed, "{}", url);
        assert_eq!(record.emails_found, 1);
    }
    assert_eq!(store.count_contacts().unwrap(), 2);
}
