//! Crawler module for catalog discovery
//!
//! This module contains the core crawling logic, including:
//! - Listing page fetching with retries and an extraction fallback chain
//! - Pagination with an empty-page streak rule
//! - Concurrency-bounded reconciliation with the store
//! - Crawl cycle coordination and continuous scheduling

mod coordinator;
mod extract;
mod fetcher;
mod pipeline;
mod progress;
mod scheduler;
mod walker;

pub use coordinator::Coordinator;
pub use extract::{
    ExtractionChain, ExtractionStrategy, MarkupStrategy, PageSnapshot, PayloadStrategy,
    ScrapedStrategy,
};
pub use fetcher::{FetchClient, FetchError, PageSource, RetryPolicy};
pub use pipeline::UpsertPipeline;
pub use progress::{CycleEvent, ProgressReporter, SilentReporter, TracingReporter};
pub use scheduler::{Scheduler, CYCLE_DELAY};
pub use walker::{PageBatch, PageWalker, EMPTY_PAGE_LIMIT};
