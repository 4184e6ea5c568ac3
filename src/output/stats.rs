//! Statistics gathered from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! frontier, job, query and contact aggregates from the storage layer.

use crate::state::{JobStatus, UrlStatus};
use crate::storage::Storage;
use crate::Result;
use std::collections::HashMap;

/// Number of recent failure reasons loaded with the statistics
const RECENT_FAILURES: usize = 10;

/// Harvest statistics summary
#[derive(Debug, Clone, Default)]
pub struct HarvestStatistics {
    /// Count of frontier URLs by status
    pub urls_by_status: HashMap<UrlStatus, u64>,

    /// Count of jobs by status
    pub jobs_by_status: HashMap<JobStatus, u64>,

    /// Queries recorded in the ledger
    pub queries_executed: u64,

    pub total_contacts: u64,

    /// (country, region, contacts), largest first
    pub contacts_by_region: Vec<(String, String, u64)>,

    /// (url, reason) of the most recent failures
    pub recent_failures: Vec<(String, String)>,
}

impl HarvestStatistics {
    pub fn total_urls(&self) -> u64 {
        self.urls_by_status.values().sum()
    }

    pub fn urls(&self, status: UrlStatus) -> u64 {
        self.urls_by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn jobs(&self, status: JobStatus) -> u64 {
        self.jobs_by_status.get(&status).copied().unwrap_or(0)
    }

    /// Share of terminal URLs that completed, in percent
    pub fn success_rate(&self) -> f64 {
        let completed = self.urls(UrlStatus::Completed);
        let terminal = completed + self.urls(UrlStatus::Failed);
        if terminal == 0 {
            0.0
        } else {
            completed as f64 / terminal as f64 * 100.0
        }
    }
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn Storage) -> Result<HarvestStatistics> {
    let recent_failures = storage
        .recent_failures(RECENT_FAILURES)?
        .into_iter()
        .map(|record| {
            let reason = record.error.unwrap_or_else(|| "unknown".to_string());
            (record.url, reason)
        })
        .collect();

    Ok(HarvestStatistics {
        urls_by_status: storage.url_status_counts()?,
        jobs_by_status: storage.job_status_counts()?,
        queries_executed: storage.count_queries()?,
        total_contacts: storage.count_contacts()?,
        contacts_by_region: storage.contact_counts_by_region()?,
        recent_failures,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("URLs ({} total):", stats.total_urls());
    for status in UrlStatus::all() {
        println!("  {}: {}", status, stats.urls(status));
    }
    println!(
        "  Success rate: {:.1}% of finished URLs",
        stats.success_rate()
    );
    println!();

    println!("Jobs:");
    for status in JobStatus::all() {
        println!("  {}: {}", status, stats.jobs(status));
    }
    println!();

    println!("Queries executed: {}", stats.queries_executed);
    println!("Contacts: {}", stats.total_contacts);
    println!();

    if !stats.contacts_by_region.is_empty() {
        println!("Contacts by Region:");
        for (country, region, count) in stats.contacts_by_region.iter().take(20) {
            println!("  {} / {}: {}", country, region, count);
        }
        println!();
    }

    if !stats.recent_failures.is_empty() {
        println!("Recent Failures:");
        for (url, reason) in &stats.recent_failures {
            println!("  {} ({})", url, reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::JobType;
    use crate::storage::{Contact, NewJob, SqliteStorage, UrlOrigin};
    use chrono::Utc;

    #[test]
    fn test_success_rate() {
        let mut stats = HarvestStatistics::default();
        assert_eq!(stats.success_rate(), 0.0);

        stats.urls_by_status.insert(UrlStatus::Completed, 3);
        stats.urls_by_status.insert(UrlStatus::Failed, 1);
        stats.urls_by_status.insert(UrlStatus::Pending, 10);
        assert_eq!(stats.success_rate(), 75.0);
        assert_eq!(stats.total_urls(), 14);
    }

    #[test]
    fn test_load_statistics() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let now = Utc::now();
        let origin = UrlOrigin {
            source: "search".to_string(),
            discovered_by: None,
            country: "US".to_string(),
            region_hint: None,
        };
        storage
            .insert_urls(&["https://a.com/".to_string(), "https://b.com/".to_string()], &origin)
            .unwrap();
        storage.claim_pending_urls(2, None, now).unwrap();
        storage.finish_url("https://a.com/", 1, None, now).unwrap();
        storage
            .finish_url("https://b.com/", 0, Some("HTTP 404"), now)
            .unwrap();
        storage
            .insert_job(
                &NewJob {
                    job_type: JobType::Full,
                    country: "US".to_string(),
                    target_regions: vec![],
                    total_queries: 0,
                },
                now,
            )
            .unwrap();
        storage
            .upsert_contact(
                &Contact {
                    email: "info@a.com".to_string(),
                    country: "US".to_string(),
                    region: Some("Texas".to_string()),
                    source_url: "https://a.com/".to_string(),
                    ..Default::default()
                },
                now,
            )
            .unwrap();

        let stats = load_statistics(&storage).unwrap();
        assert_eq!(stats.urls(UrlStatus::Completed), 1);
        assert_eq!(stats.urls(UrlStatus::Failed), 1);
        assert_eq!(stats.jobs(JobStatus::Queued), 1);
        assert_eq!(stats.total_contacts, 1);
        assert_eq!(
            stats.contacts_by_region,
            vec![("US".to_string(), "Texas".to_string(), 1)]
        );
        assert_eq!(
            stats.recent_failures,
            vec![("https://b.com/".to_string(), "HTTP 404".to_string())]
        );
    }
}
