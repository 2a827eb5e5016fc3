//! Crawler coordinator - one crawl cycle over every index key
//!
//! A cycle walks the configured index keys in order. For each key the page
//! walker pulls listing pages until the key is exhausted, and each page batch
//! goes through the upsert pipeline. Cancellation is checked before every key,
//! every page and every entry; work already in flight is never interrupted.

use crate::catalog::{CycleCounters, CycleStats};
use crate::config::{Config, CrawlerConfig};
use crate::crawler::fetcher::{FetchClient, FetchError, PageSource};
use crate::crawler::pipeline::UpsertPipeline;
use crate::crawler::progress::{CycleEvent, ProgressReporter, SilentReporter, TracingReporter};
use crate::crawler::walker::PageWalker;
use crate::notify::Notifier;
use crate::render::{build_http_client, HttpRenderer};
use crate::storage::{open_store, CatalogStore};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runs crawl cycles
pub struct Coordinator {
    source: Arc<dyn PageSource>,
    store: Arc<dyn CatalogStore>,
    pipeline: UpsertPipeline,
    reporter: Arc<dyn ProgressReporter>,
    index_keys: Vec<String>,
    page_size: u32,
    page_delay: Duration,
}

impl Coordinator {
    pub fn new(
        config: &CrawlerConfig,
        source: Arc<dyn PageSource>,
        store: Arc<dyn CatalogStore>,
        notifier: Arc<Notifier>,
    ) -> Self {
        let pipeline = UpsertPipeline::new(
            store.clone(),
            notifier,
            config.concurrency,
            config.dedup_mode,
        );

        Self {
            source,
            store,
            pipeline,
            reporter: Arc::new(SilentReporter),
            index_keys: config.index_keys.clone(),
            page_size: config.page_size,
            page_delay: config.page_delay(),
        }
    }

    /// Wires the HTTP renderer, the SQLite store and the notifier from config
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let client = build_http_client(&config.user_agent)?;
        let renderer = Arc::new(HttpRenderer::new(client.clone()));
        let source = Arc::new(FetchClient::new(renderer, config.source.clone()));
        let store = Arc::new(open_store(Path::new(&config.output.database_path))?);
        let notifier = Arc::new(Notifier::from_config(&config.notify, client)?);

        tracing::info!(
            "Notifying {} subscribers of new entries",
            notifier.registry().len()
        );

        Ok(Self::new(&config.crawler, source, store, notifier)
            .with_reporter(Arc::new(TracingReporter)))
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Runs one full crawl cycle
    ///
    /// Never fails: a key whose pages cannot be fetched counts as one error
    /// and the cycle moves on to the next key.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleStats {
        let mut stats = CycleStats::started_now();
        let counters = CycleCounters::new();

        self.reporter.report(CycleEvent::CycleStarted {
            key_count: self.index_keys.len(),
        });

        for index_key in &self.index_keys {
            if cancel.is_cancelled() {
                break;
            }

            stats.index_key = Some(index_key.clone());
            stats.page_number = 0;
            self.reporter.report(CycleEvent::KeyStarted { index_key });

            if let Err(error) = self.walk_key(index_key, &counters, &mut stats, cancel).await {
                counters.record_error();
                self.reporter
                    .report(CycleEvent::KeyFailed { index_key, error: &error });
            }
        }

        counters.apply_to(&mut stats);
        stats.cancelled = cancel.is_cancelled();

        match self.store.count_all().await {
            Ok(total) => stats.total_records = Some(total),
            Err(e) => tracing::warn!("Failed to count stored records: {}", e),
        }

        stats.finished_at = Some(Utc::now());

        if let Err(e) = self.store.record_cycle(&stats).await {
            tracing::warn!("Failed to record cycle history: {}", e);
        }

        self.reporter.report(CycleEvent::CycleFinished { stats: &stats });
        stats
    }

    async fn walk_key(
        &self,
        index_key: &str,
        counters: &CycleCounters,
        stats: &mut CycleStats,
        cancel: &CancellationToken,
    ) -> Result<(), FetchError> {
        let mut walker = PageWalker::new(self.source.as_ref(), index_key, self.page_size);

        while let Some(batch) = walker.next_batch(cancel).await? {
            stats.page_number = batch.page_number;
            self.pipeline
                .process_batch(batch.entries, counters, cancel)
                .await;

            counters.apply_to(stats);
            self.reporter
                .report(CycleEvent::PageProcessed { stats: &*stats });

            if !self.page_delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.page_delay) => {}
                    _ = cancel.cancelled() => {}
                }
            }
        }

        Ok(())
    }
}
