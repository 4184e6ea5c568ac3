//! Database schema definitions
//!
//! All timestamps are fixed-width RFC 3339 UTC strings, so comparisons and
//! ORDER BY on them follow time order.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- URL frontier: exactly one row per normalized URL
CREATE TABLE IF NOT EXISTS urls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    status TEXT NOT NULL DEFAULT 'pending',
    source TEXT NOT NULL,
    discovered_by TEXT,
    country TEXT NOT NULL,
    region_hint TEXT,
    emails_found INTEGER NOT NULL DEFAULT 0,
    error TEXT,
    created_at TEXT NOT NULL,
    claimed_at TEXT,
    processed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_urls_status ON urls(status, id);
CREATE INDEX IF NOT EXISTS idx_urls_country_status ON urls(country, status, id);

-- Harvest jobs
CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_type TEXT NOT NULL,
    country TEXT NOT NULL,
    target_regions TEXT NOT NULL DEFAULT '[]',
    status TEXT NOT NULL DEFAULT 'queued',
    query_index INTEGER NOT NULL DEFAULT 0,
    total_queries INTEGER NOT NULL DEFAULT 0,
    urls_discovered INTEGER NOT NULL DEFAULT 0,
    urls_processed INTEGER NOT NULL DEFAULT 0,
    emails_found INTEGER NOT NULL DEFAULT 0,
    error TEXT,
    created_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status, id);
CREATE INDEX IF NOT EXISTS idx_jobs_country ON jobs(country, created_at);

-- Discovery query ledger keyed by literal query text
CREATE TABLE IF NOT EXISTS queries (
    query TEXT PRIMARY KEY,
    executed_at TEXT NOT NULL,
    results_count INTEGER NOT NULL DEFAULT 0,
    urls_found INTEGER NOT NULL DEFAULT 0,
    job_id INTEGER REFERENCES jobs(id)
);

CREATE INDEX IF NOT EXISTS idx_queries_executed ON queries(executed_at);

-- Harvested contacts keyed by lowercased email
CREATE TABLE IF NOT EXISTS contacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    farm_name TEXT,
    owner_name TEXT,
    phone TEXT,
    address TEXT,
    city TEXT,
    region TEXT,
    postal_code TEXT,
    country TEXT NOT NULL,
    website TEXT,
    social_links TEXT NOT NULL DEFAULT '[]',
    cattle_type TEXT,
    breed TEXT,
    head_count INTEGER,
    source_url TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_contacts_source ON contacts(source_url);
CREATE INDEX IF NOT EXISTS idx_contacts_country_region ON contacts(country, region);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
