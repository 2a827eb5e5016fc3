//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the CatalogStore trait.
//! The connection sits behind a mutex, so concurrent upsert workers are
//! serialized and every upsert runs in its own transaction.

use crate::catalog::{CatalogEntry, CycleStats, DedupResult, PersistedRecord};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{CatalogStore, StoreError, StoreResult};
use crate::storage::{CycleRecord, CycleStatus};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const RECORD_COLUMNS: &str =
    "id, identity, title, url, concurrent_users, created_at, updated_at";

/// SQLite storage backend
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Runs `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Gets a record by identity
    pub fn find_by_identity(&self, identity: &str) -> StoreResult<Option<PersistedRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &format!("SELECT {} FROM entries WHERE identity = ?1", RECORD_COLUMNS),
                params![identity],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Gets every record, oldest first
    pub fn list_records(&self) -> StoreResult<Vec<PersistedRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM entries ORDER BY id",
            RECORD_COLUMNS
        ))?;
        let records = stmt
            .query_map([], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Gets the total record count without going through the blocking pool
    pub fn count_records(&self) -> StoreResult<u64> {
        let conn = self.lock()?;
        count_entries(&conn)
    }

    /// Gets the most recent cycles, newest first
    pub fn recent_cycles(&self, limit: usize) -> StoreResult<Vec<CycleRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, started_at, finished_at, status, total_seen, new_count, updated_count,
             skipped_count, error_count, last_index_key, total_records
             FROM cycles ORDER BY id DESC LIMIT ?1",
        )?;

        let cycles = stmt
            .query_map(params![limit as i64], |row| {
                Ok(CycleRecord {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    finished_at: row.get(2)?,
                    status: CycleStatus::from_db_string(&row.get::<_, String>(3)?)
                        .unwrap_or(CycleStatus::Completed),
                    total_seen: row.get::<_, i64>(4)? as u64,
                    new_count: row.get::<_, i64>(5)? as u64,
                    updated_count: row.get::<_, i64>(6)? as u64,
                    skipped_count: row.get::<_, i64>(7)? as u64,
                    error_count: row.get::<_, i64>(8)? as u64,
                    last_index_key: row.get(9)?,
                    total_records: row.get::<_, Option<i64>>(10)?.map(|n| n as u64),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(cycles)
    }
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn upsert_by_identity(&self, entry: &CatalogEntry) -> StoreResult<i64> {
        let entry = entry.clone();
        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO entries (identity, title, url, concurrent_users, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT(identity) DO UPDATE SET
                    title = excluded.title,
                    url = excluded.url,
                    concurrent_users = COALESCE(excluded.concurrent_users, entries.concurrent_users),
                    updated_at = excluded.updated_at",
                params![
                    entry.identity,
                    entry.title,
                    entry.url,
                    entry.concurrent_users.map(|n| n as i64),
                    now
                ],
            )?;

            let id = conn.query_row(
                "SELECT id FROM entries WHERE identity = ?1",
                params![entry.identity],
                |row| row.get(0),
            )?;
            Ok(id)
        })
        .await
    }

    async fn upsert_with_status(&self, entry: &CatalogEntry) -> StoreResult<DedupResult> {
        let entry = entry.clone();
        self.with_conn(move |conn| {
            let is_new = upsert_in_transaction(conn, &entry)?;
            Ok(DedupResult { entry, is_new })
        })
        .await
    }

    async fn exists_by_identity(&self, identity: &str) -> StoreResult<bool> {
        let identity = identity.to_string();
        self.with_conn(move |conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM entries WHERE identity = ?1)",
                params![identity],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
        .await
    }

    async fn exists_by_url(&self, url: &str) -> StoreResult<bool> {
        let url = url.to_string();
        self.with_conn(move |conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM entries WHERE url = ?1)",
                params![url],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
        .await
    }

    async fn count_all(&self) -> StoreResult<u64> {
        self.with_conn(|conn| count_entries(conn)).await
    }

    async fn record_cycle(&self, stats: &CycleStats) -> StoreResult<()> {
        let stats = stats.clone();
        self.with_conn(move |conn| {
            let status = if stats.cancelled {
                CycleStatus::Cancelled
            } else {
                CycleStatus::Completed
            };
            let started_at = stats.started_at.unwrap_or_else(Utc::now).to_rfc3339();
            let finished_at = stats.finished_at.map(|t| t.to_rfc3339());

            conn.execute(
                "INSERT INTO cycles (started_at, finished_at, status, total_seen, new_count,
                 updated_count, skipped_count, error_count, last_index_key, total_records)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    started_at,
                    finished_at,
                    status.to_db_string(),
                    stats.total_seen as i64,
                    stats.new_count as i64,
                    stats.updated_count as i64,
                    stats.skipped_count as i64,
                    stats.error_count as i64,
                    stats.index_key,
                    stats.total_records.map(|n| n as i64),
                ],
            )?;
            Ok(())
        })
        .await
    }
}

/// Applies the matching policy inside one transaction
///
/// Returns true iff a new row was inserted.
fn upsert_in_transaction(conn: &mut Connection, entry: &CatalogEntry) -> StoreResult<bool> {
    let tx = conn.transaction()?;
    let now = Utc::now().to_rfc3339();
    let users = entry.concurrent_users.map(|n| n as i64);

    // Latest row wins when historical (title, url) duplicates exist
    let by_pair: Option<i64> = tx
        .query_row(
            "SELECT id FROM entries WHERE title = ?1 AND url = ?2
             ORDER BY updated_at DESC, id DESC LIMIT 1",
            params![entry.title, entry.url],
            |row| row.get(0),
        )
        .optional()?;

    let by_identity: Option<i64> = tx
        .query_row(
            "SELECT id FROM entries WHERE identity = ?1",
            params![entry.identity],
            |row| row.get(0),
        )
        .optional()?;

    let is_new = match (by_pair, by_identity) {
        (Some(pair_id), None) => {
            // Same entry under a churned identity
            tx.execute(
                "UPDATE entries SET identity = ?1,
                 concurrent_users = COALESCE(?2, concurrent_users), updated_at = ?3
                 WHERE id = ?4",
                params![entry.identity, users, now, pair_id],
            )?;
            false
        }
        (Some(pair_id), Some(identity_id)) if pair_id == identity_id => {
            tx.execute(
                "UPDATE entries SET concurrent_users = COALESCE(?1, concurrent_users),
                 updated_at = ?2 WHERE id = ?3",
                params![users, now, pair_id],
            )?;
            false
        }
        (_, Some(identity_id)) => {
            // The identity is owned by another row: rewriting the matched pair
            // would break the unique constraint, so the identity row moves instead
            tx.execute(
                "UPDATE entries SET title = ?1, url = ?2,
                 concurrent_users = COALESCE(?3, concurrent_users), updated_at = ?4
                 WHERE id = ?5",
                params![entry.title, entry.url, users, now, identity_id],
            )?;
            false
        }
        (None, None) => {
            tx.execute(
                "INSERT INTO entries (identity, title, url, concurrent_users, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![entry.identity, entry.title, entry.url, users, now],
            )?;
            true
        }
    };

    tx.commit()?;
    Ok(is_new)
}

fn count_entries(conn: &Connection) -> StoreResult<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
    Ok(count as u64)
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<PersistedRecord> {
    Ok(PersistedRecord {
        id: row.get(0)?,
        identity: row.get(1)?,
        title: row.get(2)?,
        url: row.get(3)?,
        concurrent_users: row.get::<_, Option<i64>>(4)?.map(|n| n as u64),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
