//! Static HTTP renderer
//!
//! Fetches listing pages with reqwest and scrapes them with scraper. Pages are
//! not executed, so only server-rendered markup or a JSON listing response is
//! visible to the extraction chain.

use crate::catalog::identity_from_url;
use crate::config::UserAgentConfig;
use crate::render::{
    RenderContext, RenderError, RenderedPage, Renderer, ResponsePredicate, ScrapedLink,
    WaitStrategy,
};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

/// Attributes that carry an entry identity, in preference order
const IDENTITY_ATTRIBUTES: [&str; 3] = ["data-game-id", "data-place-id", "data-id"];

/// Attributes that carry an entry title, in preference order
const TITLE_ATTRIBUTES: [&str; 3] = ["data-title", "title", "aria-label"];

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use catalog_sentinel::config::UserAgentConfig;
/// use catalog_sentinel::render::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "CatalogSentinel".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "ops@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Renderer handing out reqwest-backed contexts
#[derive(Debug, Clone)]
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn acquire_context(&self) -> Result<Box<dyn RenderContext>, RenderError> {
        Ok(Box::new(HttpRenderContext {
            client: self.client.clone(),
            page: None,
            released: false,
        }))
    }
}

#[derive(Debug)]
struct LoadedPage {
    final_url: Url,
    content_type: String,
    body: String,
}

/// A context holds at most one loaded page
#[derive(Debug)]
struct HttpRenderContext {
    client: Client,
    page: Option<LoadedPage>,
    released: bool,
}

impl HttpRenderContext {
    fn loaded_page(&self) -> Result<&LoadedPage, RenderError> {
        if self.released {
            return Err(RenderError::Released);
        }
        self.page.as_ref().ok_or(RenderError::NoPage)
    }
}

#[async_trait]
impl RenderContext for HttpRenderContext {
    async fn render(
        &mut self,
        url: &Url,
        _wait: WaitStrategy,
        timeout: Duration,
    ) -> Result<RenderedPage, RenderError> {
        if self.released {
            return Err(RenderError::Released);
        }

        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                RenderError::Timeout {
                    url: url.to_string(),
                }
            } else {
                RenderError::Http {
                    url: url.to_string(),
                    source: e,
                }
            }
        };

        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(map_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response.text().await.map_err(map_err)?;

        let title = if content_type.contains("html") {
            extract_title(&body)
        } else {
            None
        };

        tracing::trace!("Rendered {} ({} bytes, {})", final_url, body.len(), content_type);

        self.page = Some(LoadedPage {
            final_url: final_url.clone(),
            content_type,
            body,
        });

        Ok(RenderedPage { final_url, title })
    }

    async fn observe_json_response(
        &mut self,
        predicate: &ResponsePredicate,
        _timeout: Duration,
    ) -> Result<Option<Value>, RenderError> {
        // The whole response is already here, there is nothing to wait for
        let page = self.loaded_page()?;
        if !predicate.matches(page.final_url.as_str(), &page.content_type) {
            return Ok(None);
        }

        match serde_json::from_str(&page.body) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::debug!("Payload at {} is not valid JSON: {}", page.final_url, e);
                Ok(None)
            }
        }
    }

    async fn extract_by_css(
        &mut self,
        selectors: &[String],
    ) -> Result<Vec<ScrapedLink>, RenderError> {
        let page = self.loaded_page()?;
        if !page.content_type.contains("html") {
            return Ok(Vec::new());
        }
        scrape_links(&page.body, selectors, &page.final_url)
    }

    async fn content(&mut self) -> Result<String, RenderError> {
        Ok(self.loaded_page()?.body.clone())
    }

    async fn release(&mut self) {
        self.page = None;
        self.released = true;
    }
}

/// Extracts the page title from an HTML document
fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;

    document
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Scrapes entry links matching any of `selectors`
///
/// A matched element contributes its own `href` or, failing that, the first
/// descendant anchor's. Links without an identity are skipped; each href is
/// reported once even when several selectors match it.
fn scrape_links(
    html: &str,
    selectors: &[String],
    base_url: &Url,
) -> Result<Vec<ScrapedLink>, RenderError> {
    let document = Html::parse_document(html);
    let anchor = Selector::parse("a[href]")
        .map_err(|e| RenderError::Selector(format!("a[href]: {:?}", e)))?;

    let mut links = Vec::new();
    let mut seen = HashSet::new();

    for raw in selectors {
        let selector = Selector::parse(raw)
            .map_err(|e| RenderError::Selector(format!("{}: {:?}", raw, e)))?;

        for element in document.select(&selector) {
            let Some(href) = element
                .value()
                .attr("href")
                .or_else(|| {
                    element
                        .select(&anchor)
                        .next()
                        .and_then(|a| a.value().attr("href"))
                })
                .map(str::trim)
                .filter(|href| !href.is_empty())
            else {
                continue;
            };

            let Ok(resolved) = base_url.join(href) else {
                continue;
            };

            let identity = IDENTITY_ATTRIBUTES
                .iter()
                .find_map(|attr| element.value().attr(attr))
                .map(str::to_string)
                .or_else(|| identity_from_url(&resolved, ""));
            let Some(identity) = identity else {
                continue;
            };

            if !seen.insert(resolved.to_string()) {
                continue;
            }

            links.push(ScrapedLink {
                identity,
                title: element_title(&element),
                href: href.to_string(),
            });
        }
    }

    Ok(links)
}

fn element_title(element: &ElementRef<'_>) -> String {
    TITLE_ATTRIBUTES
        .iter()
        .find_map(|attr| element.value().attr(attr))
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| {
            element
                .text()
                .flat_map(str::split_whitespace)
                .collect::<Vec<_>>()
                .join(" ")
        })
}
