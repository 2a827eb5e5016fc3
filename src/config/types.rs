use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Main configuration structure for Catalog-Sentinel
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub source: SourceConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Crawl cycle behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Width of the upsert worker pool, shared by the whole cycle
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Entries requested per listing page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Pause between two listing pages of the same key (milliseconds)
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// How the pipeline reconciles entries with the store
    #[serde(default)]
    pub dedup_mode: DedupMode,

    /// Ordered shard keys walked by every cycle
    #[serde(default = "default_index_keys")]
    pub index_keys: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            page_size: default_page_size(),
            page_delay_ms: default_page_delay_ms(),
            dedup_mode: DedupMode::default(),
            index_keys: default_index_keys(),
        }
    }
}

impl CrawlerConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

/// Store reconciliation strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DedupMode {
    /// Every entry goes through the full matching policy
    #[default]
    Status,

    /// Entries whose URL is already stored are skipped without an update
    SkipKnownUrls,
}

/// Listing source configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceConfig {
    /// Base URL of the listing; key, page and sort are added as query parameters
    pub listing_url: String,

    /// Popularity sort key passed to the listing
    #[serde(default = "default_sort")]
    pub sort: String,

    /// Entry page URL with an `{id}` placeholder
    pub entry_url_template: String,

    /// URL fragment identifying the listing's JSON payload response
    #[serde(default = "default_payload_url_fragment")]
    pub payload_url_fragment: String,

    /// CSS selectors matching entry links in the rendered page
    #[serde(default = "default_entry_selectors")]
    pub entry_selectors: Vec<String>,

    /// Page navigation timeout (milliseconds)
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    /// Bounded wait for the JSON payload (milliseconds)
    #[serde(default = "default_payload_timeout_ms")]
    pub payload_timeout_ms: u64,
}

impl SourceConfig {
    /// Builds an entry URL for the given identity
    pub fn entry_url(&self, identity: &str) -> String {
        self.entry_url_template.replace("{id}", identity)
    }

    /// Path prefix shared by all entry URLs, e.g. `/games/`
    pub fn entry_path_prefix(&self) -> Option<String> {
        let head = self.entry_url_template.split("{id}").next()?;
        let url = Url::parse(head).ok()?;
        Some(url.path().to_string())
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn payload_timeout(&self) -> Duration {
        Duration::from_millis(self.payload_timeout_ms)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL; ContactEmail)
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Notification delivery configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyConfig {
    /// Bot endpoint receiving `{chat_id, text, parse_mode}` posts; messages are
    /// only logged when absent
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Subscribers known at startup
    #[serde(default)]
    pub subscribers: Vec<String>,
}

fn default_concurrency() -> usize {
    3
}

fn default_page_size() -> u32 {
    100
}

fn default_page_delay_ms() -> u64 {
    1000
}

fn default_sort() -> String {
    "popular".to_string()
}

fn default_payload_url_fragment() -> String {
    "/api/".to_string()
}

fn default_entry_selectors() -> Vec<String> {
    vec!["[data-game-id]".to_string(), "a[href*='/games/']".to_string()]
}

fn default_navigation_timeout_ms() -> u64 {
    30_000
}

fn default_payload_timeout_ms() -> u64 {
    6_000
}

/// Cyrillic alphabet followed by the Latin one
pub fn default_index_keys() -> Vec<String> {
    "абвгдеёжзийклмнопрстуфхцчшщъыьэюя"
        .chars()
        .chain('a'..='z')
        .map(String::from)
        .collect()
}
