//! Resilient listing page fetcher
//!
//! This module turns one `(index key, page)` pair into catalog entries:
//! - Building the listing URL from the source configuration
//! - Rendering the page in a fresh render context per attempt
//! - Collecting the JSON payload, scraped links and markup
//! - Reconciling them through the extraction chain
//! - Retrying render errors and empty results with a growing delay

use crate::catalog::CatalogEntry;
use crate::config::SourceConfig;
use crate::crawler::extract::{ExtractionChain, PageSnapshot};
use crate::render::{RenderContext, RenderError, Renderer, ResponsePredicate, WaitStrategy};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors surfaced by the fetcher once retries are spent
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Page {page} of index key '{index_key}' failed after {attempts} attempts: {source}")]
    Exhausted {
        index_key: String,
        page: u32,
        attempts: u32,
        #[source]
        source: RenderError,
    },

    #[error("Invalid listing URL: {0}")]
    InvalidListingUrl(#[from] url::ParseError),
}

/// Anything that can produce the entries of one listing page
///
/// An empty vector means the page holds no entries.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(
        &self,
        index_key: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<CatalogEntry>, FetchError>;
}

/// How often and how patiently a page is retried
///
/// The delay after attempt `n` is `base_delay + step * (n - 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
    pub step: Duration,
}

impl Default for RetryPolicy {
    /// 3 attempts, waiting 2s then 3s
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(2),
            step: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Same attempt count without any delay between attempts
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            base_delay: Duration::ZERO,
            step: Duration::ZERO,
        }
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay + self.step * attempt.saturating_sub(1)
    }
}

/// Page fetcher backed by a [`Renderer`]
pub struct FetchClient {
    renderer: Arc<dyn Renderer>,
    chain: ExtractionChain,
    source: SourceConfig,
    retry: RetryPolicy,
}

impl FetchClient {
    pub fn new(renderer: Arc<dyn Renderer>, source: SourceConfig) -> Self {
        Self {
            renderer,
            chain: ExtractionChain::standard(&source),
            source,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Builds the listing URL for one page of an index key
    ///
    /// # Example
    ///
    /// For `listing-url = "https://catalog.example.com/games"`, key `"а"`,
    /// page 2 and page size 100 the result is
    /// `https://catalog.example.com/games?letter=%D0%B0&page=2&per_page=100&sort=popular`.
    pub fn build_listing_url(
        &self,
        index_key: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.source.listing_url)?;
        url.query_pairs_mut()
            .append_pair("letter", index_key)
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &page_size.to_string())
            .append_pair("sort", &self.source.sort);
        Ok(url)
    }

    /// One attempt in a fresh context, released on every path
    async fn attempt(&self, url: &Url) -> Result<Vec<CatalogEntry>, RenderError> {
        let mut context = self.renderer.acquire_context().await?;
        let result = self.extract_in(context.as_mut(), url).await;
        context.release().await;
        result
    }

    async fn extract_in(
        &self,
        context: &mut dyn RenderContext,
        url: &Url,
    ) -> Result<Vec<CatalogEntry>, RenderError> {
        let rendered = context
            .render(url, WaitStrategy::NetworkIdle, self.source.navigation_timeout())
            .await?;

        // Each auxiliary view is optional; the chain copes with what is there
        let predicate = ResponsePredicate::url_contains(&self.source.payload_url_fragment);
        let payload = context
            .observe_json_response(&predicate, self.source.payload_timeout())
            .await
            .unwrap_or_else(|e| {
                tracing::debug!("No payload observed for {}: {}", url, e);
                None
            });

        let scraped = context
            .extract_by_css(&self.source.entry_selectors)
            .await
            .unwrap_or_else(|e| {
                tracing::debug!("Link scraping failed for {}: {}", url, e);
                Vec::new()
            });

        let markup = context.content().await.ok();

        let snapshot = PageSnapshot {
            final_url: rendered.final_url,
            payload,
            scraped,
            markup,
        };

        Ok(self.chain.run(&snapshot))
    }
}

#[async_trait]
impl PageSource for FetchClient {
    async fn fetch_page(
        &self,
        index_key: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<CatalogEntry>, FetchError> {
        let url = self.build_listing_url(index_key, page, page_size)?;
        let attempts = self.retry.attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.attempt(&url).await {
                Ok(entries) if !entries.is_empty() => return Ok(entries),
                Ok(_) => {
                    tracing::debug!(
                        "Attempt {}/{} for {} returned no entries",
                        attempt,
                        attempts,
                        url
                    );
                    last_error = None;
                }
                Err(e) => {
                    tracing::warn!("Attempt {}/{} for {} failed: {}", attempt, attempts, url, e);
                    last_error = Some(e);
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.retry.delay_after(attempt)).await;
            }
        }

        match last_error {
            Some(source) => Err(FetchError::Exhausted {
                index_key: index_key.to_string(),
                page,
                attempts,
                source,
            }),
            None => Ok(Vec::new()),
        }
    }
}
