//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Catalog-Sentinel database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per logical catalog entry
CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    identity TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    url TEXT NOT NULL,
    concurrent_users INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- (title, url) is not unique: historical duplicates are tolerated
CREATE INDEX IF NOT EXISTS idx_entries_title_url ON entries(title, url);
CREATE INDEX IF NOT EXISTS idx_entries_url ON entries(url);

-- Finished crawl cycles
CREATE TABLE IF NOT EXISTS cycles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    status TEXT NOT NULL,
    total_seen INTEGER NOT NULL DEFAULT 0,
    new_count INTEGER NOT NULL DEFAULT 0,
    updated_count INTEGER NOT NULL DEFAULT 0,
    skipped_count INTEGER NOT NULL DEFAULT 0,
    error_count INTEGER NOT NULL DEFAULT 0,
    last_index_key TEXT,
    total_records INTEGER
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
