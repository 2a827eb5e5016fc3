//! Dedup-aware upsert pipeline
//!
//! Each page batch is reconciled against the store concurrently. The width is
//! bounded by a semaphore shared by the whole cycle, so at most `concurrency`
//! store operations are in flight no matter how pages are batched.

use crate::catalog::{CatalogEntry, CycleCounters, UpsertOutcome};
use crate::config::DedupMode;
use crate::notify::Notifier;
use crate::storage::{CatalogStore, StoreResult};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Reconciles entries with the store and announces new ones
pub struct UpsertPipeline {
    store: Arc<dyn CatalogStore>,
    notifier: Arc<Notifier>,
    semaphore: Arc<Semaphore>,
    mode: DedupMode,
}

impl UpsertPipeline {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        notifier: Arc<Notifier>,
        concurrency: usize,
        mode: DedupMode,
    ) -> Self {
        Self {
            store,
            notifier,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            mode,
        }
    }

    /// Processes one page batch, recording outcomes in `counters`
    ///
    /// Entries not yet started when `cancel` fires are left alone; entries
    /// already talking to the store run to completion. A store error is
    /// counted for its entry only.
    pub async fn process_batch(
        &self,
        entries: Vec<CatalogEntry>,
        counters: &CycleCounters,
        cancel: &CancellationToken,
    ) {
        counters.add_seen(entries.len() as u64);

        let tasks = entries
            .into_iter()
            .map(|entry| self.process_entry(entry, counters, cancel));
        join_all(tasks).await;
    }

    async fn process_entry(
        &self,
        entry: CatalogEntry,
        counters: &CycleCounters,
        cancel: &CancellationToken,
    ) {
        if cancel.is_cancelled() {
            return;
        }

        let Ok(permit) = self.semaphore.acquire().await else {
            return;
        };
        if cancel.is_cancelled() {
            return;
        }

        let outcome = self.reconcile(&entry).await;
        drop(permit);

        match outcome {
            Ok(outcome) => {
                counters.record(outcome);
                if outcome == UpsertOutcome::New {
                    tracing::info!("New entry: {} ({})", entry.title, entry.url);
                    self.notifier.notify_new(&entry).await;
                }
            }
            Err(e) => {
                tracing::warn!("Failed to store entry {}: {}", entry.url, e);
                counters.record_error();
            }
        }
    }

    async fn reconcile(&self, entry: &CatalogEntry) -> StoreResult<UpsertOutcome> {
        match self.mode {
            DedupMode::Status => {
                let result = self.store.upsert_with_status(entry).await?;
                Ok(UpsertOutcome::from(&result))
            }
            DedupMode::SkipKnownUrls => {
                if self.store.exists_by_url(&entry.url).await? {
                    return Ok(UpsertOutcome::Skipped);
                }
                let known = self.store.exists_by_identity(&entry.identity).await?;
                self.store.upsert_by_identity(entry).await?;
                if known {
                    Ok(UpsertOutcome::Updated)
                } else {
                    Ok(UpsertOutcome::New)
                }
            }
        }
    }
}
