//! Progress events emitted during a crawl cycle

use crate::catalog::CycleStats;
use crate::crawler::FetchError;

/// Milestones of a crawl cycle
#[derive(Debug)]
pub enum CycleEvent<'a> {
    CycleStarted { key_count: usize },
    KeyStarted { index_key: &'a str },
    PageProcessed { stats: &'a CycleStats },
    KeyFailed { index_key: &'a str, error: &'a FetchError },
    CycleFinished { stats: &'a CycleStats },
}

/// Receives cycle progress
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: CycleEvent<'_>);
}

/// Ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn report(&self, _event: CycleEvent<'_>) {}
}

/// Logs events through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, event: CycleEvent<'_>) {
        match event {
            CycleEvent::CycleStarted { key_count } => {
                tracing::info!("Crawl cycle started over {} index keys", key_count);
            }
            CycleEvent::KeyStarted { index_key } => {
                tracing::info!("Walking index key '{}'", index_key);
            }
            CycleEvent::PageProcessed { stats } => {
                tracing::debug!(
                    "Key '{}' page {}: {} seen, {} new, {} updated, {} skipped, {} errors",
                    stats.index_key.as_deref().unwrap_or("-"),
                    stats.page_number,
                    stats.total_seen,
                    stats.new_count,
                    stats.updated_count,
                    stats.skipped_count,
                    stats.error_count
                );
            }
            CycleEvent::KeyFailed { index_key, error } => {
                tracing::warn!("Index key '{}' failed: {}", index_key, error);
            }
            CycleEvent::CycleFinished { stats } => {
                tracing::info!(
                    "Crawl cycle {}: {} seen, {} new, {} updated, {} skipped, {} errors",
                    if stats.cancelled { "cancelled" } else { "finished" },
                    stats.total_seen,
                    stats.new_count,
                    stats.updated_count,
                    stats.skipped_count,
                    stats.error_count
                );
            }
        }
    }
}
