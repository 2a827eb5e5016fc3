//! Page rendering collaborator
//!
//! The crawl core never drives a browser directly. It asks a [`Renderer`] for
//! an isolated [`RenderContext`], renders one listing page in it, reads what it
//! needs (JSON payload, scraped entry links, raw markup) and releases it.
//!
//! [`HttpRenderer`] is a static implementation over reqwest: it does not run
//! scripts, but exposes a JSON listing response as the observed payload.

mod http;

pub use http::{build_http_client, HttpRenderer};

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors raised by a render context
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("HTTP error for {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Navigation to {url} timed out")]
    Timeout { url: String },

    #[error("Invalid CSS selector: {0}")]
    Selector(String),

    #[error("No page has been rendered in this context")]
    NoPage,

    #[error("Render context was already released")]
    Released,

    #[error("Renderer unavailable: {0}")]
    Unavailable(String),
}

/// When navigation counts as finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    Load,
    DomContentLoaded,
    NetworkIdle,
}

/// Outcome of a navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// URL after redirects
    pub final_url: Url,

    /// Document title, if any
    pub title: Option<String>,
}

/// An entry link scraped from rendered markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedLink {
    pub identity: String,
    pub title: String,
    /// As found in the page, possibly relative
    pub href: String,
}

/// Selects which network response carries the listing payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePredicate {
    url_fragment: String,
}

impl ResponsePredicate {
    /// Matches JSON responses whose URL contains `fragment`
    pub fn url_contains(fragment: impl Into<String>) -> Self {
        Self {
            url_fragment: fragment.into(),
        }
    }

    pub fn matches(&self, url: &str, content_type: &str) -> bool {
        url.contains(&self.url_fragment) && content_type.contains("json")
    }
}

/// Hands out isolated render contexts
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn acquire_context(&self) -> Result<Box<dyn RenderContext>, RenderError>;
}

/// One isolated browsing context
///
/// `release` must be safe to call more than once and after any failure.
#[async_trait]
pub trait RenderContext: Send {
    /// Navigates to `url` and waits according to `wait`
    async fn render(
        &mut self,
        url: &Url,
        wait: WaitStrategy,
        timeout: Duration,
    ) -> Result<RenderedPage, RenderError>;

    /// Waits up to `timeout` for a JSON response matching `predicate`
    async fn observe_json_response(
        &mut self,
        predicate: &ResponsePredicate,
        timeout: Duration,
    ) -> Result<Option<Value>, RenderError>;

    /// Scrapes entry links matching any of `selectors`
    async fn extract_by_css(&mut self, selectors: &[String])
        -> Result<Vec<ScrapedLink>, RenderError>;

    /// Returns the rendered markup
    async fn content(&mut self) -> Result<String, RenderError>;

    /// Closes the context
    async fn release(&mut self);
}
