//! Entry extraction from a rendered listing page
//!
//! A listing page offers up to three views of the same entries: the JSON
//! payload the page loaded, the entry links scraped from the rendered DOM, and
//! the raw markup. Each view is handled by an [`ExtractionStrategy`]; the
//! [`ExtractionChain`] tries them in order and keeps the first non-empty result.

use crate::catalog::{identity_from_url, CatalogEntry};
use crate::config::SourceConfig;
use crate::render::ScrapedLink;
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use url::Url;

/// Payload fields holding the primary identity, in preference order
const PRIMARY_IDENTITY_FIELDS: [&str; 3] = ["place_id", "game_id", "id"];

/// Payload field matched against scraped link identities
const SECONDARY_IDENTITY_FIELD: &str = "id";

const TITLE_FIELDS: [&str; 2] = ["name", "title"];

const USERS_FIELDS: [&str; 3] = ["playing", "online", "concurrent_users"];

/// Everything one render produced for a listing page
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    /// URL the page ended up on; relative hrefs resolve against it
    pub final_url: Url,

    /// JSON payload observed while rendering
    pub payload: Option<Value>,

    /// Entry links scraped from the rendered DOM
    pub scraped: Vec<ScrapedLink>,

    /// Rendered markup
    pub markup: Option<String>,
}

/// One way of turning a page snapshot into entries
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns `None` when this view of the page is unavailable
    fn extract(&self, page: &PageSnapshot) -> Option<Vec<CatalogEntry>>;
}

/// Reconciles the JSON payload with scraped links
///
/// Scraped URLs are better locators than ones built from raw payload ids, so
/// each payload item takes the URL of the scraped link whose identity equals
/// the item's secondary identity. If no item matches any link, URLs are
/// synthesized from the entry URL template instead.
#[derive(Debug, Clone)]
pub struct PayloadStrategy {
    source: SourceConfig,
}

impl PayloadStrategy {
    pub fn new(source: SourceConfig) -> Self {
        Self { source }
    }
}

impl ExtractionStrategy for PayloadStrategy {
    fn name(&self) -> &'static str {
        "payload"
    }

    fn extract(&self, page: &PageSnapshot) -> Option<Vec<CatalogEntry>> {
        let games = page.payload.as_ref().and_then(games_collection)?;

        let links: HashMap<&str, &ScrapedLink> = page
            .scraped
            .iter()
            .map(|link| (link.identity.as_str(), link))
            .collect();

        let mut matched = Vec::new();
        let mut synthesized = Vec::new();

        for item in games {
            let Some(identity) = PRIMARY_IDENTITY_FIELDS
                .iter()
                .find_map(|field| string_field(item, field))
            else {
                continue;
            };
            let secondary =
                string_field(item, SECONDARY_IDENTITY_FIELD).unwrap_or_else(|| identity.clone());
            let title = TITLE_FIELDS
                .iter()
                .find_map(|field| string_field(item, field));
            let users = USERS_FIELDS.iter().find_map(|field| count_field(item, field));

            if let Some(link) = links.get(secondary.as_str()) {
                if let Ok(url) = page.final_url.join(&link.href) {
                    matched.push(CatalogEntry {
                        identity: identity.clone(),
                        title: title.clone().unwrap_or_else(|| link.title.clone()),
                        url: url.to_string(),
                        concurrent_users: users,
                    });
                }
            }

            synthesized.push(CatalogEntry {
                url: self.source.entry_url(&identity),
                identity,
                title: title.unwrap_or_default(),
                concurrent_users: users,
            });
        }

        if matched.is_empty() {
            Some(synthesized)
        } else {
            Some(matched)
        }
    }
}

/// Uses the scraped links on their own
#[derive(Debug, Clone, Default)]
pub struct ScrapedStrategy;

impl ExtractionStrategy for ScrapedStrategy {
    fn name(&self) -> &'static str {
        "scraped"
    }

    fn extract(&self, page: &PageSnapshot) -> Option<Vec<CatalogEntry>> {
        if page.scraped.is_empty() {
            return None;
        }

        let entries = page
            .scraped
            .iter()
            .filter_map(|link| {
                let url = page.final_url.join(&link.href).ok()?;
                Some(CatalogEntry::new(
                    link.identity.clone(),
                    link.title.clone(),
                    url.to_string(),
                ))
            })
            .collect();

        Some(entries)
    }
}

/// Last resort: every anchor under the entry path prefix in the raw markup
#[derive(Debug, Clone)]
pub struct MarkupStrategy {
    path_prefix: String,
}

impl MarkupStrategy {
    pub fn new(path_prefix: impl Into<String>) -> Self {
        Self {
            path_prefix: path_prefix.into(),
        }
    }
}

impl ExtractionStrategy for MarkupStrategy {
    fn name(&self) -> &'static str {
        "markup"
    }

    fn extract(&self, page: &PageSnapshot) -> Option<Vec<CatalogEntry>> {
        let markup = page.markup.as_deref()?;
        let document = Html::parse_document(markup);
        let anchor = Selector::parse("a[href]").ok()?;

        let entries = document
            .select(&anchor)
            .filter_map(|element| {
                let href = element.value().attr("href")?;
                let url = page.final_url.join(href.trim()).ok()?;
                if !url.path().starts_with(&self.path_prefix) {
                    return None;
                }
                let identity = identity_from_url(&url, &self.path_prefix)?;
                let title = element
                    .value()
                    .attr("title")
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| {
                        element
                            .text()
                            .flat_map(str::split_whitespace)
                            .collect::<Vec<_>>()
                            .join(" ")
                    });
                Some(CatalogEntry::new(identity, title, url.to_string()))
            })
            .collect();

        Some(entries)
    }
}

/// Ordered fallback chain of extraction strategies
pub struct ExtractionChain {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl ExtractionChain {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Payload, then scraped links, then raw markup
    pub fn standard(source: &SourceConfig) -> Self {
        let prefix = source
            .entry_path_prefix()
            .unwrap_or_else(|| "/".to_string());

        Self::new(vec![
            Box::new(PayloadStrategy::new(source.clone())),
            Box::new(ScrapedStrategy),
            Box::new(MarkupStrategy::new(prefix)),
        ])
    }

    /// Runs the strategies in order
    ///
    /// Entries without a title or URL are dropped and repeated identities keep
    /// their first occurrence. An empty result means no strategy found
    /// anything, which is the normal end-of-data signal.
    pub fn run(&self, page: &PageSnapshot) -> Vec<CatalogEntry> {
        for strategy in &self.strategies {
            let Some(entries) = strategy.extract(page) else {
                continue;
            };

            let raw = entries.len();
            let mut seen = HashSet::new();
            let accepted: Vec<_> = entries
                .into_iter()
                .filter(|entry| entry.is_acceptable() && seen.insert(entry.identity.clone()))
                .collect();

            if raw != accepted.len() {
                tracing::debug!(
                    "Strategy '{}' dropped {} of {} entries on {}",
                    strategy.name(),
                    raw - accepted.len(),
                    raw,
                    page.final_url
                );
            }

            if !accepted.is_empty() {
                tracing::debug!(
                    "Strategy '{}' extracted {} entries from {}",
                    strategy.name(),
                    accepted.len(),
                    page.final_url
                );
                return accepted;
            }
        }

        Vec::new()
    }
}

/// The `games` collection, at the top level or under `data`
fn games_collection(payload: &Value) -> Option<&Vec<Value>> {
    payload
        .get("games")
        .or_else(|| payload.get("data").and_then(|data| data.get("games")))
        .and_then(Value::as_array)
}

/// Reads a string or number field as a non-empty string
fn string_field(item: &Value, field: &str) -> Option<String> {
    match item.get(field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn count_field(item: &Value, field: &str) -> Option<u64> {
    match item.get(field)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source() -> SourceConfig {
        SourceConfig {
            listing_url: "https://catalog.example.com/games".to_string(),
            sort: "popular".to_string(),
            entry_url_template: "https://catalog.example.com/games/{id}".to_string(),
            payload_url_fragment: "/api/".to_string(),
            entry_selectors: vec!["[data-game-id]".to_string()],
            navigation_timeout_ms: 5_000,
            payload_timeout_ms: 1_000,
        }
    }

    fn chain() -> ExtractionChain {
        ExtractionChain::new(vec![
            Box::new(PayloadStrategy::new(source())),
            Box::new(ScrapedStrategy),
            Box::new(MarkupStrategy::new("/games/")),
        ])
    }

    fn snapshot() -> PageSnapshot {
        PageSnapshot {
            final_url: Url::parse("https://catalog.example.com/games?letter=a&page=1").unwrap(),
            payload: None,
            scraped: Vec::new(),
            markup: None,
        }
    }

    fn link(identity: &str, title: &str, href: &str) -> ScrapedLink {
        ScrapedLink {
            identity: identity.to_string(),
            title: title.to_string(),
            href: href.to_string(),
        }
    }

    #[test]
    fn test_payload_prefers_scraped_urls() {
        let mut page = snapshot();
        page.payload = Some(json!({
            "games": [
                {"place_id": 9001, "id": 11, "name": "Alpha", "playing": 120},
                {"place_id": 9002, "id": 12, "name": "Beta"}
            ]
        }));
        page.scraped = vec![link("11", "Alpha (dom)", "/games/11/alpha")];

        let entries = chain().run(&page);

        assert_eq!(
            entries,
            vec![CatalogEntry::new(
                "9001",
                "Alpha",
                "https://catalog.example.com/games/11/alpha"
            )
            .with_concurrent_users(120)]
        );
    }

    #[test]
    fn test_payload_without_matches_synthesizes_urls() {
        let mut page = snapshot();
        page.payload = Some(json!({
            "data": {"games": [{"game_id": "77", "title": "Gamma", "online": "15"}]}
        }));
        page.scraped = vec![link("999", "Other", "/games/999")];

        let entries = chain().run(&page);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].identity, "77");
        assert_eq!(entries[0].url, "https://catalog.example.com/games/77");
        assert_eq!(entries[0].concurrent_users, Some(15));
    }

    #[test]
    fn test_synthesized_urls_follow_entry_template() {
        let mut config = source();
        config.entry_url_template = "https://catalog.example.com/play/{id}/lobby".to_string();
        let mut page = snapshot();
        page.payload = Some(json!({"games": [{"place_id": 8, "name": "Theta"}]}));

        let entries = PayloadStrategy::new(config.clone()).extract(&page).unwrap();

        assert_eq!(entries[0].url, config.entry_url("8"));
        assert_eq!(entries[0].url, "https://catalog.example.com/play/8/lobby");
    }

    #[test]
    fn test_payload_title_falls_back_to_scraped_title() {
        let mut page = snapshot();
        page.payload = Some(json!({"games": [{"id": 5}]}));
        page.scraped = vec![link("5", "Delta", "/games/5")];

        let entries = chain().run(&page);

        assert_eq!(entries[0].title, "Delta");
    }

    #[test]
    fn test_no_payload_uses_scraped_links() {
        let mut page = snapshot();
        page.scraped = vec![
            link("1", "Alpha", "/games/1"),
            link("2", "Beta", "https://catalog.example.com/games/2"),
        ];

        let entries = chain().run(&page);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].url, "https://catalog.example.com/games/1");
    }

    #[test]
    fn test_empty_payload_falls_through() {
        let mut page = snapshot();
        page.payload = Some(json!({"games": []}));
        page.scraped = vec![link("1", "Alpha", "/games/1")];

        let entries = chain().run(&page);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].identity, "1");
    }

    #[test]
    fn test_markup_is_last_resort() {
        let mut page = snapshot();
        page.markup = Some(
            r#"<html><body>
                <a href="/games/31/zeta">Zeta</a>
                <a href="/games/31/zeta-again">Zeta again</a>
                <a href="/games/32" title="Eta"><img src="x.png"></a>
                <a href="/help">Help</a>
            </body></html>"#
                .to_string(),
        );

        let entries = chain().run(&page);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].identity, "31");
        assert_eq!(entries[0].title, "Zeta");
        assert_eq!(entries[1].title, "Eta");
    }

    #[test]
    fn test_untitled_entries_are_dropped() {
        let mut page = snapshot();
        page.scraped = vec![link("1", "", "/games/1"), link("2", "Beta", "/games/2")];

        let entries = chain().run(&page);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].identity, "2");
    }

    #[test]
    fn test_nothing_found_is_empty() {
        let mut page = snapshot();
        page.markup = Some("<html><body>No results</body></html>".to_string());

        assert!(chain().run(&page).is_empty());
    }
}
