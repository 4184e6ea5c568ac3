//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::{JobStatus, JobType, UrlStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    from_db_timestamp, to_db_timestamp, ClaimedUrl, Contact, ContactRecord, JobProgress,
    JobRecord, NewJob, QueryRecord, UrlOrigin, UrlRecord,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

const URL_COLUMNS: &str = "id, url, status, source, discovered_by, country, region_hint, \
     emails_found, error, created_at, claimed_at, processed_at";

const JOB_COLUMNS: &str = "id, job_type, country, target_regions, status, query_index, \
     total_queries, urls_discovered, urls_processed, emails_found, error, created_at, \
     started_at, completed_at";

const CONTACT_COLUMNS: &str = "email, farm_name, owner_name, phone, address, city, region, \
     postal_code, country, website, social_links, cattle_type, breed, head_count, source_url, \
     created_at, updated_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// Several processes (or several handles in one process) may open the
    /// same file; writers wait on each other through the busy timeout.
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;
        conn.busy_timeout(Duration::from_secs(10))?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn url_from_row(row: &Row<'_>) -> rusqlite::Result<UrlRecord> {
    Ok(UrlRecord {
        id: row.get(0)?,
        url: row.get(1)?,
        status: UrlStatus::from_db_string(&row.get::<_, String>(2)?).unwrap_or(UrlStatus::Pending),
        source: row.get(3)?,
        discovered_by: row.get(4)?,
        country: row.get(5)?,
        region_hint: row.get(6)?,
        emails_found: row.get::<_, i64>(7)? as u32,
        error: row.get(8)?,
        created_at: row.get(9)?,
        claimed_at: row.get(10)?,
        processed_at: row.get(11)?,
    })
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<JobRecord> {
    let regions: String = row.get(3)?;
    Ok(JobRecord {
        id: row.get(0)?,
        job_type: JobType::from_db_string(&row.get::<_, String>(1)?).unwrap_or(JobType::Full),
        country: row.get(2)?,
        target_regions: serde_json::from_str(&regions).unwrap_or_default(),
        status: JobStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(JobStatus::Failed),
        query_index: row.get::<_, i64>(5)? as u64,
        total_queries: row.get::<_, i64>(6)? as u64,
        urls_discovered: row.get::<_, i64>(7)? as u64,
        urls_processed: row.get::<_, i64>(8)? as u64,
        emails_found: row.get::<_, i64>(9)? as u64,
        error: row.get(10)?,
        created_at: row.get(11)?,
        started_at: row.get(12)?,
        completed_at: row.get(13)?,
    })
}

fn contact_from_row(row: &Row<'_>) -> rusqlite::Result<ContactRecord> {
    let links: String = row.get(10)?;
    Ok(ContactRecord {
        contact: Contact {
            email: row.get(0)?,
            farm_name: row.get(1)?,
            owner_name: row.get(2)?,
            phone: row.get(3)?,
            address: row.get(4)?,
            city: row.get(5)?,
            region: row.get(6)?,
            postal_code: row.get(7)?,
            country: row.get(8)?,
            website: row.get(9)?,
            social_links: serde_json::from_str(&links).unwrap_or_default(),
            cattle_type: row.get(11)?,
            breed: row.get(12)?,
            head_count: row.get::<_, Option<i64>>(13)?.map(|n| n as u32),
            source_url: row.get(14)?,
        },
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

/// Treats blank strings as missing so they never overwrite stored values
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Storage for SqliteStorage {
    // ===== URL Frontier =====

    fn insert_urls(&mut self, urls: &[String], origin: &UrlOrigin) -> StorageResult<usize> {
        let now = to_db_timestamp(Utc::now());
        let tx = self.conn.transaction()?;
        let mut added = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO urls (url, status, source, discovered_by, country, region_hint, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(url) DO NOTHING",
            )?;
            for url in urls {
                added += stmt.execute(params![
                    url,
                    UrlStatus::Pending.to_db_string(),
                    origin.source,
                    origin.discovered_by,
                    origin.country,
                    origin.region_hint,
                    now
                ])?;
            }
        }
        tx.commit()?;
        Ok(added)
    }

    fn claim_pending_urls(
        &mut self,
        limit: usize,
        country: Option<&str>,
        claimed_at: DateTime<Utc>,
    ) -> StorageResult<Vec<ClaimedUrl>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        // One UPDATE ... RETURNING inside an immediate transaction: the
        // select and the flip cannot interleave with another claimer.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut claimed = {
            let mut stmt = tx.prepare(
                "UPDATE urls SET status = ?1, claimed_at = ?2
                 WHERE id IN (
                     SELECT id FROM urls
                     WHERE status = ?3 AND (?4 IS NULL OR country = ?4)
                     ORDER BY id
                     LIMIT ?5
                 )
                 RETURNING id, url, source, country, region_hint",
            )?;
            let rows = stmt.query_map(
                params![
                    UrlStatus::Processing.to_db_string(),
                    to_db_timestamp(claimed_at),
                    UrlStatus::Pending.to_db_string(),
                    country,
                    limit as i64
                ],
                |row| {
                    Ok(ClaimedUrl {
                        id: row.get(0)?,
                        url: row.get(1)?,
                        source: row.get(2)?,
                        country: row.get(3)?,
                        region_hint: row.get(4)?,
                    })
                },
            )?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        tx.commit()?;

        claimed.sort_by_key(|c| c.id);
        Ok(claimed)
    }

    fn finish_url(
        &mut self,
        url: &str,
        emails_found: u32,
        error: Option<&str>,
        finished_at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let status = if error.is_some() {
            UrlStatus::Failed
        } else {
            UrlStatus::Completed
        };
        let changed = self.conn.execute(
            "UPDATE urls SET status = ?1, emails_found = ?2, error = ?3, processed_at = ?4
             WHERE url = ?5 AND status IN (?6, ?7)",
            params![
                status.to_db_string(),
                emails_found as i64,
                error,
                to_db_timestamp(finished_at),
                url,
                UrlStatus::Pending.to_db_string(),
                UrlStatus::Processing.to_db_string()
            ],
        )?;
        Ok(changed > 0)
    }

    fn get_url(&self, url: &str) -> StorageResult<Option<UrlRecord>> {
        let sql = format!("SELECT {} FROM urls WHERE url = ?1", URL_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![url], url_from_row)
            .optional()?)
    }

    fn reset_processing_urls(&mut self, batch: usize) -> StorageResult<usize> {
        let changed = self.conn.execute(
            "UPDATE urls SET status = ?1, claimed_at = NULL
             WHERE id IN (SELECT id FROM urls WHERE status = ?2 ORDER BY id LIMIT ?3)",
            params![
                UrlStatus::Pending.to_db_string(),
                UrlStatus::Processing.to_db_string(),
                batch as i64
            ],
        )?;
        Ok(changed)
    }

    fn count_urls_by_status(
        &self,
        status: UrlStatus,
        country: Option<&str>,
    ) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM urls WHERE status = ?1 AND (?2 IS NULL OR country = ?2)",
            params![status.to_db_string(), country],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn url_status_counts(&self) -> StorageResult<HashMap<UrlStatus, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM urls GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (status, count) = row?;
            if let Some(status) = UrlStatus::from_db_string(&status) {
                counts.insert(status, count as u64);
            }
        }
        Ok(counts)
    }

    fn recent_failures(&self, limit: usize) -> StorageResult<Vec<UrlRecord>> {
        let sql = format!(
            "SELECT {} FROM urls WHERE status = ?1 ORDER BY processed_at DESC, id DESC LIMIT ?2",
            URL_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![UrlStatus::Failed.to_db_string(), limit as i64],
            url_from_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // ===== Jobs =====

    fn insert_job(&mut self, job: &NewJob, created_at: DateTime<Utc>) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO jobs (job_type, country, target_regions, status, total_queries, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                job.job_type.to_db_string(),
                job.country,
                serde_json::to_string(&job.target_regions)?,
                JobStatus::Queued.to_db_string(),
                job.total_queries as i64,
                to_db_timestamp(created_at)
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn claim_next_job(&mut self, started_at: DateTime<Utc>) -> StorageResult<Option<JobRecord>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let sql = format!(
            "UPDATE jobs SET status = ?1, started_at = ?2
             WHERE id = (SELECT id FROM jobs WHERE status = ?3 ORDER BY id LIMIT 1)
             RETURNING {}",
            JOB_COLUMNS
        );
        let job = tx
            .query_row(
                &sql,
                params![
                    JobStatus::Running.to_db_string(),
                    to_db_timestamp(started_at),
                    JobStatus::Queued.to_db_string()
                ],
                job_from_row,
            )
            .optional()?;
        tx.commit()?;
        Ok(job)
    }

    fn get_job(&self, job_id: i64) -> StorageResult<JobRecord> {
        let sql = format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS);
        self.conn
            .query_row(&sql, params![job_id], job_from_row)
            .optional()?
            .ok_or(StorageError::JobNotFound(job_id))
    }

    fn add_job_progress(&mut self, job_id: i64, progress: &JobProgress) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE jobs SET
                 query_index = COALESCE(?1, query_index),
                 urls_discovered = urls_discovered + ?2,
                 urls_processed = urls_processed + ?3,
                 emails_found = emails_found + ?4
             WHERE id = ?5",
            params![
                progress.query_index.map(|i| i as i64),
                progress.urls_discovered as i64,
                progress.urls_processed as i64,
                progress.emails_found as i64,
                job_id
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::JobNotFound(job_id));
        }
        Ok(())
    }

    fn finish_job(
        &mut self,
        job_id: i64,
        status: JobStatus,
        error: Option<&str>,
        finished_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current: Option<String> = tx
            .query_row(
                "SELECT status FROM jobs WHERE id = ?1",
                params![job_id],
                |row| row.get(0),
            )
            .optional()?;
        let current = current
            .as_deref()
            .and_then(JobStatus::from_db_string)
            .ok_or(StorageError::JobNotFound(job_id))?;

        if !current.can_transition_to(status) || !status.is_terminal() {
            return Err(StorageError::InvalidTransition {
                id: job_id,
                from: current,
                to: status,
            });
        }

        tx.execute(
            "UPDATE jobs SET status = ?1, error = ?2, completed_at = ?3 WHERE id = ?4",
            params![
                status.to_db_string(),
                error,
                to_db_timestamp(finished_at),
                job_id
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn fail_running_jobs(&mut self, reason: &str, at: DateTime<Utc>) -> StorageResult<usize> {
        let changed = self.conn.execute(
            "UPDATE jobs SET status = ?1, error = ?2, completed_at = ?3 WHERE status = ?4",
            params![
                JobStatus::Failed.to_db_string(),
                reason,
                to_db_timestamp(at),
                JobStatus::Running.to_db_string()
            ],
        )?;
        Ok(changed)
    }

    fn list_jobs(&self, limit: usize) -> StorageResult<Vec<JobRecord>> {
        let sql = format!("SELECT {} FROM jobs ORDER BY id DESC LIMIT ?1", JOB_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], job_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn job_status_counts(&self) -> StorageResult<HashMap<JobStatus, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (status, count) = row?;
            if let Some(status) = JobStatus::from_db_string(&status) {
                counts.insert(status, count as u64);
            }
        }
        Ok(counts)
    }

    fn latest_job_created_at(&self, country: &str) -> StorageResult<Option<DateTime<Utc>>> {
        let latest: Option<String> = self.conn.query_row(
            "SELECT MAX(created_at) FROM jobs WHERE country = ?1",
            params![country],
            |row| row.get(0),
        )?;
        Ok(latest.as_deref().and_then(from_db_timestamp))
    }

    // ===== Query Ledger =====

    fn upsert_query(&mut self, record: &QueryRecord) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO queries (query, executed_at, results_count, urls_found, job_id)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(query) DO UPDATE SET
                 executed_at = excluded.executed_at,
                 results_count = excluded.results_count,
                 urls_found = excluded.urls_found,
                 job_id = excluded.job_id",
            params![
                record.query,
                to_db_timestamp(record.executed_at),
                record.results_count as i64,
                record.urls_found as i64,
                record.job_id
            ],
        )?;
        Ok(())
    }

    fn get_query(&self, query: &str) -> StorageResult<Option<QueryRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT query, executed_at, results_count, urls_found, job_id
                 FROM queries WHERE query = ?1",
                params![query],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                    ))
                },
            )
            .optional()?;

        Ok(record.and_then(|(query, executed_at, results, urls, job_id)| {
            Some(QueryRecord {
                query,
                executed_at: from_db_timestamp(&executed_at)?,
                results_count: results as u32,
                urls_found: urls as u32,
                job_id,
            })
        }))
    }

    fn queries_executed_after(&self, cutoff: DateTime<Utc>) -> StorageResult<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT query FROM queries WHERE executed_at > ?1")?;
        let rows = stmt.query_map(params![to_db_timestamp(cutoff)], |row| row.get(0))?;
        Ok(rows.collect::<Result<HashSet<String>, _>>()?)
    }

    fn count_queries(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM queries", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Contacts =====

    fn upsert_contact(&mut self, contact: &Contact, at: DateTime<Utc>) -> StorageResult<bool> {
        let email = contact.email.trim().to_lowercase();
        if email.is_empty() {
            return Err(StorageError::Database(
                "contact email cannot be empty".to_string(),
            ));
        }
        let now = to_db_timestamp(at);
        let links = if contact.social_links.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&contact.social_links)?)
        };

        let tx = self.conn.transaction()?;
        let existed: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM contacts WHERE email = ?1)",
            params![email],
            |row| row.get(0),
        )?;

        tx.execute(
            "INSERT INTO contacts (email, farm_name, owner_name, phone, address, city, region,
                 postal_code, country, website, social_links, cattle_type, breed, head_count,
                 source_url, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, COALESCE(?11, '[]'), ?12, ?13,
                 ?14, ?15, ?16, ?16)
             ON CONFLICT(email) DO UPDATE SET
                 farm_name = COALESCE(excluded.farm_name, contacts.farm_name),
                 owner_name = COALESCE(excluded.owner_name, contacts.owner_name),
                 phone = COALESCE(excluded.phone, contacts.phone),
                 address = COALESCE(excluded.address, contacts.address),
                 city = COALESCE(excluded.city, contacts.city),
                 region = COALESCE(excluded.region, contacts.region),
                 postal_code = COALESCE(excluded.postal_code, contacts.postal_code),
                 country = excluded.country,
                 website = COALESCE(excluded.website, contacts.website),
                 social_links = COALESCE(?11, contacts.social_links),
                 cattle_type = COALESCE(excluded.cattle_type, contacts.cattle_type),
                 breed = COALESCE(excluded.breed, contacts.breed),
                 head_count = COALESCE(excluded.head_count, contacts.head_count),
                 source_url = COALESCE(NULLIF(contacts.source_url, ''), excluded.source_url),
                 updated_at = excluded.updated_at",
            params![
                email,
                non_empty(&contact.farm_name),
                non_empty(&contact.owner_name),
                non_empty(&contact.phone),
                non_empty(&contact.address),
                non_empty(&contact.city),
                non_empty(&contact.region),
                non_empty(&contact.postal_code),
                contact.country,
                non_empty(&contact.website),
                links,
                non_empty(&contact.cattle_type),
                non_empty(&contact.breed),
                contact.head_count.map(|n| n as i64),
                contact.source_url,
                now
            ],
        )?;
        tx.commit()?;

        Ok(!existed)
    }

    fn has_contact_from_source(&self, source_url: &str) -> StorageResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM contacts WHERE source_url = ?1)",
            params![source_url],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn get_contact(&self, email: &str) -> StorageResult<Option<ContactRecord>> {
        let sql = format!("SELECT {} FROM contacts WHERE email = ?1", CONTACT_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![email.trim().to_lowercase()], contact_from_row)
            .optional()?)
    }

    fn count_contacts(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM contacts", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn contact_counts_by_region(&self) -> StorageResult<Vec<(String, String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT country, COALESCE(region, ''), COUNT(*) AS n FROM contacts
             GROUP BY country, COALESCE(region, '')
             ORDER BY n DESC, country, 2",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)? as u64,
            ))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn recent_contacts(&self, limit: usize) -> StorageResult<Vec<ContactRecord>> {
        let sql = format!(
            "SELECT {} FROM contacts ORDER BY updated_at DESC, id DESC LIMIT ?1",
            CONTACT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], contact_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
