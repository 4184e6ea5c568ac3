//! Output module for harvest statistics and summaries
//!
//! This module handles:
//! - Loading aggregate statistics from the store
//! - Printing them for `--stats`
//! - Writing the markdown report for `--export-summary`

mod markdown;
pub mod stats;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{load_statistics, print_statistics, HarvestStatistics};

use crate::storage::{to_db_timestamp, ContactRecord, JobRecord, Storage};
use crate::Result;
use chrono::Utc;

/// Jobs listed in a summary
const SUMMARY_JOBS: usize = 50;

/// Contacts listed in a summary
const SUMMARY_CONTACTS: usize = 25;

/// Everything the markdown report shows
#[derive(Debug, Clone)]
pub struct HarvestSummary {
    pub generated_at: String,
    pub config_hash: Option<String>,
    pub stats: HarvestStatistics,
    /// Most recent jobs, newest first
    pub jobs: Vec<JobRecord>,
    pub recent_contacts: Vec<ContactRecord>,
}

/// Generates a harvest summary from storage
pub fn generate_summary(storage: &dyn Storage, config_hash: Option<String>) -> Result<HarvestSummary> {
    Ok(HarvestSummary {
        generated_at: to_db_timestamp(Utc::now()),
        config_hash,
        stats: load_statistics(storage)?,
        jobs: storage.list_jobs(SUMMARY_JOBS)?,
        recent_contacts: storage.recent_contacts(SUMMARY_CONTACTS)?,
    })
}
