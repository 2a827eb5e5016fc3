use crate::catalog::UpsertOutcome;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters and position for one crawl cycle
///
/// A fresh value is created at the start of every cycle; snapshots of it are
/// handed to progress reporters while the cycle runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Entries accepted from listing pages
    pub total_seen: u64,

    /// Entries that were not in the store before
    pub new_count: u64,

    /// Entries that matched an existing record
    pub updated_count: u64,

    /// Entries skipped by the known-URL pre-filter
    pub skipped_count: u64,

    /// Failed keys plus failed entries
    pub error_count: u64,

    /// Index key currently (or last) being walked
    pub index_key: Option<String>,

    /// Page number currently (or last) being processed
    pub page_number: u32,

    /// Record count read from the store after the cycle
    pub total_records: Option<u64>,

    /// Whether the cycle stopped early on cancellation
    pub cancelled: bool,

    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CycleStats {
    /// Creates stats for a cycle starting now
    pub fn started_now() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Wall-clock duration of a finished cycle
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// Lock-free counters shared by the concurrent upsert workers of one cycle
#[derive(Debug, Default)]
pub struct CycleCounters {
    total_seen: AtomicU64,
    new_count: AtomicU64,
    updated_count: AtomicU64,
    skipped_count: AtomicU64,
    error_count: AtomicU64,
}

impl CycleCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_seen(&self, count: u64) {
        self.total_seen.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record(&self, outcome: UpsertOutcome) {
        let counter = match outcome {
            UpsertOutcome::New => &self.new_count,
            UpsertOutcome::Updated => &self.updated_count,
            UpsertOutcome::Skipped => &self.skipped_count,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies the current counter values into `stats`
    pub fn apply_to(&self, stats: &mut CycleStats) {
        stats.total_seen = self.total_seen.load(Ordering::Relaxed);
        stats.new_count = self.new_count.load(Ordering::Relaxed);
        stats.updated_count = self.updated_count.load(Ordering::Relaxed);
        stats.skipped_count = self.skipped_count.load(Ordering::Relaxed);
        stats.error_count = self.error_count.load(Ordering::Relaxed);
    }
}
