//! Continuous crawl scheduler
//!
//! This module keeps crawl cycles running back to back:
//! - The first cycle starts right away when the scheduler is started
//! - After each cycle completes, the next one is scheduled [`CYCLE_DELAY`] later
//! - Stopping cancels the in-flight cycle and the pending delay
//! - A cycle gate keeps at most one cycle in flight, even across restarts

use crate::catalog::CycleStats;
use crate::crawler::Coordinator;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Pause between the end of one cycle and the start of the next
pub const CYCLE_DELAY: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Stopped,
    Starting,
    Running,
}

/// Everything reset together by `stop`
struct RunState {
    phase: Phase,
    cancel: Option<CancellationToken>,
}

/// State shared with the background loop
struct Shared {
    cycle_gate: tokio::sync::Mutex<()>,
    last_cycle: Mutex<Option<CycleStats>>,
}

/// Runs crawl cycles in the background until stopped
pub struct Scheduler {
    coordinator: Arc<Coordinator>,
    shared: Arc<Shared>,
    state: Mutex<RunState>,
    cycle_delay: Duration,
}

impl Scheduler {
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
            shared: Arc::new(Shared {
                cycle_gate: tokio::sync::Mutex::new(()),
                last_cycle: Mutex::new(None),
            }),
            state: Mutex::new(RunState {
                phase: Phase::Stopped,
                cancel: None,
            }),
            cycle_delay: CYCLE_DELAY,
        }
    }

    pub fn with_cycle_delay(mut self, delay: Duration) -> Self {
        self.cycle_delay = delay;
        self
    }

    /// Starts continuous crawling
    ///
    /// Returns false, doing nothing, if crawling is already active. Must be
    /// called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut state = self.lock_state();
        if state.phase != Phase::Stopped {
            tracing::warn!("Continuous crawling is already active");
            return false;
        }

        state.phase = Phase::Starting;
        let cancel = CancellationToken::new();
        tokio::spawn(run_loop(
            self.coordinator.clone(),
            self.shared.clone(),
            self.cycle_delay,
            cancel.clone(),
        ));
        state.cancel = Some(cancel);
        state.phase = Phase::Running;

        tracing::info!("Continuous crawling started");
        true
    }

    /// Stops continuous crawling
    ///
    /// Returns false, doing nothing, if crawling is not active. The in-flight
    /// cycle stops at its next cancellation point; use [`Scheduler::wait_idle`]
    /// to wait for it.
    pub fn stop(&self) -> bool {
        let mut state = self.lock_state();
        if state.phase == Phase::Stopped {
            tracing::warn!("Continuous crawling is not active");
            return false;
        }

        state.phase = Phase::Stopped;
        if let Some(cancel) = state.cancel.take() {
            cancel.cancel();
        }

        tracing::info!("Continuous crawling stopped");
        true
    }

    pub fn is_active(&self) -> bool {
        self.lock_state().phase != Phase::Stopped
    }

    /// Waits until no cycle is in flight
    pub async fn wait_idle(&self) {
        let _gate = self.shared.cycle_gate.lock().await;
    }

    /// Stats of the most recently finished cycle
    pub fn last_cycle(&self) -> Option<CycleStats> {
        self.shared
            .last_cycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(cancel) = self.lock_state().cancel.take() {
            cancel.cancel();
        }
    }
}

async fn run_loop(
    coordinator: Arc<Coordinator>,
    shared: Arc<Shared>,
    cycle_delay: Duration,
    cancel: CancellationToken,
) {
    loop {
        {
            let _gate = shared.cycle_gate.lock().await;
            if cancel.is_cancelled() {
                break;
            }

            let stats = coordinator.run_cycle(&cancel).await;
            *shared
                .last_cycle
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(stats);
        }

        tracing::debug!("Next crawl cycle in {:?}", cycle_delay);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(cycle_delay) => {}
        }
    }

    tracing::debug!("Crawl loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEntry;
    use crate::config::CrawlerConfig;
    use crate::crawler::{CycleEvent, FetchError, PageSource, ProgressReporter};
    use crate::notify::Notifier;
    use crate::storage::SqliteStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// One entry on page 1 of every key, each page taking one second
    struct SlowSource;

    #[async_trait]
    impl PageSource for SlowSource {
        async fn fetch_page(
            &self,
            index_key: &str,
            page: u32,
            _page_size: u32,
        ) -> Result<Vec<CatalogEntry>, FetchError> {
            tokio::time::sleep(Duration::from_secs(1)).await;
            if page > 1 {
                return Ok(Vec::new());
            }
            Ok(vec![CatalogEntry::new(
                index_key,
                format!("Game {index_key}"),
                format!("https://catalog.example.com/games/{index_key}"),
            )])
        }
    }

    /// Tracks how many cycles ran and how many overlapped
    #[derive(Default)]
    struct CycleTracker {
        started: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ProgressReporter for CycleTracker {
        fn report(&self, event: CycleEvent<'_>) {
            match event {
                CycleEvent::CycleStarted { .. } => {
                    self.started.fetch_add(1, Ordering::SeqCst);
                    let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    self.peak.fetch_max(now, Ordering::SeqCst);
                }
                CycleEvent::CycleFinished { .. } => {
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);
                }
                _ => {}
            }
        }
    }

    fn scheduler(tracker: Arc<CycleTracker>) -> Scheduler {
        let config = CrawlerConfig {
            page_delay_ms: 0,
            index_keys: vec!["a".to_string(), "b".to_string()],
            ..CrawlerConfig::default()
        };
        let store = Arc::new(SqliteStore::new_in_memory().unwrap());
        let coordinator = Coordinator::new(
            &config,
            Arc::new(SlowSource),
            store,
            Arc::new(Notifier::disabled()),
        )
        .with_reporter(tracker);

        Scheduler::new(coordinator)
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_runs_one_loop() {
        let tracker = Arc::new(CycleTracker::default());
        let scheduler = scheduler(tracker.clone());

        assert!(scheduler.start());
        assert!(!scheduler.start());
        assert!(scheduler.is_active());

        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(tracker.started.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.peak.load(Ordering::SeqCst), 1);
        let last = scheduler.last_cycle().unwrap();
        assert_eq!(last.new_count, 2);
        assert!(!last.cancelled);

        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_cycle_after_delay() {
        let tracker = Arc::new(CycleTracker::default());
        let scheduler = scheduler(tracker.clone());

        scheduler.start();
        // First cycle takes 8s (4 pages per key), then 5 minutes of rest
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(tracker.started.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(tracker.started.load(Ordering::SeqCst), 2);

        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let tracker = Arc::new(CycleTracker::default());
        let scheduler = scheduler(tracker);

        assert!(!scheduler.stop());
        assert!(scheduler.start());
        assert!(scheduler.stop());
        assert!(!scheduler.stop());
        assert!(!scheduler.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_in_flight_cycle() {
        let tracker = Arc::new(CycleTracker::default());
        let scheduler = scheduler(tracker.clone());

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        scheduler.stop();
        scheduler.wait_idle().await;

        let last = scheduler.last_cycle().unwrap();
        assert!(last.cancelled);
        assert_eq!(last.index_key.as_deref(), Some("a"));

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(tracker.started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_never_overlaps_cycles() {
        let tracker = Arc::new(CycleTracker::default());
        let scheduler = scheduler(tracker.clone());

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(500)).await;
        scheduler.stop();
        assert!(scheduler.start());

        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(tracker.started.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.peak.load(Ordering::SeqCst), 1);
        scheduler.stop();
    }
}
