//! Storage traits and error types
//!
//! This module defines the trait interface the crawl core needs from the
//! persistent store and the associated error types.

use crate::catalog::{CatalogEntry, CycleStats, DedupResult};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database lock poisoned")]
    Poisoned,

    #[error("Storage task failed: {0}")]
    Task(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence operations used by the upsert pipeline and the coordinator
///
/// Implementations must serialize conflicting writes themselves; the pipeline
/// calls these methods from several workers at once.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Inserts or updates a record keyed by identity
    ///
    /// # Returns
    ///
    /// The surrogate key of the record
    async fn upsert_by_identity(&self, entry: &CatalogEntry) -> StoreResult<i64>;

    /// Inserts or updates a record, reporting whether it was new
    ///
    /// Matching order:
    /// 1. exact `(title, url)`: the identity is rewritten to the incoming one
    /// 2. identity: title and url are rewritten
    /// 3. otherwise a new record is inserted
    async fn upsert_with_status(&self, entry: &CatalogEntry) -> StoreResult<DedupResult>;

    /// Checks whether a record has this identity
    async fn exists_by_identity(&self, identity: &str) -> StoreResult<bool>;

    /// Checks whether any record has this URL
    async fn exists_by_url(&self, url: &str) -> StoreResult<bool>;

    /// Counts all records
    async fn count_all(&self) -> StoreResult<u64>;

    /// Appends a finished cycle to the cycle history
    async fn record_cycle(&self, _stats: &CycleStats) -> StoreResult<()> {
        Ok(())
    }
}
