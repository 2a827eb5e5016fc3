//! Storage module for persisting catalog entries
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - The dedup-aware upsert used by the crawl pipeline
//! - Cycle history for status reporting

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{CatalogStore, StoreError, StoreResult};

use std::path::Path;

/// Initializes or opens a storage database
pub fn open_store(path: &Path) -> StoreResult<SqliteStore> {
    SqliteStore::new(path)
}

/// Represents a finished crawl cycle
#[derive(Debug, Clone)]
pub struct CycleRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: CycleStatus,
    pub total_seen: u64,
    pub new_count: u64,
    pub updated_count: u64,
    pub skipped_count: u64,
    pub error_count: u64,
    pub last_index_key: Option<String>,
    pub total_records: Option<u64>,
}

/// Status of a finished crawl cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    Completed,
    Cancelled,
}

impl CycleStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}
