//! Pagination walker for one index key
//!
//! The walker pulls pages lazily from a [`PageSource`], starting at page 1.
//! A non-empty page resets the empty streak and is handed out; an empty page
//! extends the streak, and the walk ends once the streak reaches
//! [`EMPTY_PAGE_LIMIT`]. Sparse listings can have empty gaps, so a single
//! empty page is not the end.

use crate::catalog::CatalogEntry;
use crate::crawler::fetcher::{FetchError, PageSource};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

/// Consecutive empty pages that exhaust an index key
pub const EMPTY_PAGE_LIMIT: u32 = 3;

/// A non-empty page of entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBatch {
    pub index_key: String,
    pub page_number: u32,
    pub entries: Vec<CatalogEntry>,
}

/// Walks the pages of one index key
pub struct PageWalker<'a> {
    source: &'a dyn PageSource,
    index_key: String,
    page_size: u32,
    next_page: u32,
    empty_streak: u32,
    processed: HashSet<u32>,
    finished: bool,
}

impl<'a> PageWalker<'a> {
    pub fn new(source: &'a dyn PageSource, index_key: impl Into<String>, page_size: u32) -> Self {
        Self {
            source,
            index_key: index_key.into(),
            page_size,
            next_page: 1,
            empty_streak: 0,
            processed: HashSet::new(),
            finished: false,
        }
    }

    /// Last page number requested, 0 before the first fetch
    pub fn current_page(&self) -> u32 {
        self.next_page - 1
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fetches pages until one has entries
    ///
    /// Returns `Ok(None)` when the key is exhausted or `cancel` fired, and
    /// keeps returning it afterwards. A fetch error finishes the walk.
    pub async fn next_batch(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<PageBatch>, FetchError> {
        while !self.finished {
            if cancel.is_cancelled() {
                tracing::debug!("Walk of '{}' cancelled", self.index_key);
                self.finished = true;
                break;
            }

            let page = self.next_page;
            if !self.processed.insert(page) {
                tracing::warn!(
                    "Page {} of '{}' was already processed, ending walk",
                    page,
                    self.index_key
                );
                self.finished = true;
                break;
            }
            self.next_page += 1;

            let entries = match self
                .source
                .fetch_page(&self.index_key, page, self.page_size)
                .await
            {
                Ok(entries) => entries,
                Err(e) => {
                    self.finished = true;
                    return Err(e);
                }
            };

            if entries.is_empty() {
                self.empty_streak += 1;
                tracing::debug!(
                    "Page {} of '{}' is empty ({}/{})",
                    page,
                    self.index_key,
                    self.empty_streak,
                    EMPTY_PAGE_LIMIT
                );
                if self.empty_streak >= EMPTY_PAGE_LIMIT {
                    self.finished = true;
                }
                continue;
            }

            self.empty_streak = 0;
            tracing::debug!(
                "Page {} of '{}' has {} entries",
                page,
                self.index_key,
                entries.len()
            );

            return Ok(Some(PageBatch {
                index_key: self.index_key.clone(),
                page_number: page,
                entries,
            }));
        }

        Ok(None)
    }
}
