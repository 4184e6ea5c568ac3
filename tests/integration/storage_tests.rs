//! Store behavior across connections and restarts

use crate::common::temp_storage;
use cattle_harvest::state::{JobStatus, JobType, UrlStatus};
use cattle_harvest::storage::{share, SqliteStorage, Storage, UrlOrigin};
use cattle_harvest::worker::{Frontier, JobStore, QueryLedger, ORPHAN_REASON};
use chrono::{Duration, Utc};
use std::collections::HashSet;
use tempfile::TempDir;

fn origin() -> UrlOrigin {
    UrlOrigin {
        source: "search".to_string(),
        discovered_by: Some("cattle ranch Texas".to_string()),
        country: "US".to_string(),
        region_hint: Some("Texas".to_string()),
    }
}

#[test]
fn test_no_double_claim_across_connections() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("harvest.db");

    let urls: Vec<String> = (0..60).map(|i| format!("https://ranch{}.com/", i)).collect();
    SqliteStorage::new(&db)
        .unwrap()
        .insert_urls(&urls, &origin())
        .unwrap();

    let claimers: Vec<_> = (0..3)
        .map(|_| {
            let db = db.clone();
            std::thread::spawn(move || {
                let mut storage = SqliteStorage::new(&db).unwrap();
                let mut mine = Vec::new();
                loop {
                    let batch = storage.claim_pending_urls(7, None, Utc::now()).unwrap();
                    if batch.is_empty() {
                        break;
                    }
                    mine.extend(batch.into_iter().map(|c| c.url));
                }
                mine
            })
        })
        .collect();

    let mut seen = HashSet::new();
    let mut total = 0;
    for claimer in claimers {
        for url in claimer.join().unwrap() {
            total += 1;
            assert!(seen.insert(url), "URL claimed twice");
        }
    }
    assert_eq!(total, 60);

    let storage = SqliteStorage::new(&db).unwrap();
    assert_eq!(storage.count_urls_by_status(UrlStatus::Processing, None).unwrap(), 60);
    assert_eq!(storage.count_urls_by_status(UrlStatus::Pending, None).unwrap(), 0);
}

#[test]
fn test_recovery_converges_after_crash() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("harvest.db");

    {
        let storage = share(SqliteStorage::new(&db).unwrap());
        let frontier = Frontier::new(storage.clone(), vec![], 4);
        let jobs = JobStore::new(storage);
        let urls: Vec<String> = (0..10).map(|i| format!("https://farm{}.com/", i)).collect();
        frontier.enqueue(&urls, &origin()).unwrap();
        frontier.claim(10, None).unwrap();
        jobs.create(JobType::Full, "US", vec![], 0).unwrap();
        jobs.claim_next().unwrap();
        // Process dies here without finishing anything
    }

    let storage = share(SqliteStorage::new(&db).unwrap());
    let frontier = Frontier::new(storage.clone(), vec![], 4);
    let jobs = JobStore::new(storage);

    assert_eq!(frontier.recover_stuck().unwrap(), 10);
    assert_eq!(jobs.fail_orphans().unwrap(), 1);

    assert_eq!(frontier.count(UrlStatus::Processing, None).unwrap(), 0);
    assert_eq!(frontier.count(UrlStatus::Pending, None).unwrap(), 10);
    let counts = jobs.status_counts().unwrap();
    assert_eq!(counts.get(&JobStatus::Running), None);
    let job = &jobs.list(1).unwrap()[0];
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some(ORPHAN_REASON));
}

#[test]
fn test_query_ttl_survives_reopen() {
    let (dir, storage) = temp_storage();
    let ledger = QueryLedger::new(storage);
    let now = Utc::now();
    let ttl = Duration::days(30);

    ledger
        .mark_done_at("angus ranch Texas", 8, 8, None, now - Duration::days(29))
        .unwrap();
    ledger
        .mark_done_at("angus ranch Montana", 3, 3, None, now - Duration::days(31))
        .unwrap();
    drop(ledger);

    let reopened = QueryLedger::new(share(SqliteStorage::new(&dir.path().join("harvest.db")).unwrap()));
    assert!(reopened.is_fresh_at("angus ranch Texas", ttl, now).unwrap());
    assert!(!reopened.is_fresh_at("angus ranch Montana", ttl, now).unwrap());
    assert!(!reopened.is_fresh_at("angus ranch Kansas", ttl, now).unwrap());

    let fresh = reopened.fresh_set_at(ttl, now).unwrap();
    assert_eq!(fresh.len(), 1);
    assert!(fresh.contains("angus ranch Texas"));
    assert_eq!(reopened.count().unwrap(), 2);
}
