use url::Url;

/// An entry discovered on one listing page
///
/// The `identity` is assigned upstream and is not stable across scrapes;
/// the `(title, url)` pair is the more durable locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Upstream identifier (place id, game id or listing id)
    pub identity: String,

    /// Display title
    pub title: String,

    /// Absolute URL of the entry page
    pub url: String,

    /// Concurrent users reported by the listing, advisory only
    pub concurrent_users: Option<u64>,
}

impl CatalogEntry {
    /// Creates an entry without a concurrent-users signal
    pub fn new(
        identity: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            identity: identity.into(),
            title: title.into(),
            url: url.into(),
            concurrent_users: None,
        }
    }

    /// Attaches the concurrent-users signal
    pub fn with_concurrent_users(mut self, users: u64) -> Self {
        self.concurrent_users = Some(users);
        self
    }

    /// Whether this entry may enter the upsert pipeline
    ///
    /// Entries without a title or URL are dropped at extraction time.
    pub fn is_acceptable(&self) -> bool {
        !self.title.trim().is_empty() && !self.url.trim().is_empty()
    }
}

/// A row owned by the persistent store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedRecord {
    pub id: i64,
    pub identity: String,
    pub title: String,
    pub url: String,
    pub concurrent_users: Option<u64>,
    pub created_at: String,
    pub updated_at: String,
}

/// Result of an upsert that reports whether the entry was new
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupResult {
    pub entry: CatalogEntry,

    /// True iff no record matched by `(title, url)` or by identity
    pub is_new: bool,
}

/// Classification of one entry by the upsert pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpsertOutcome {
    New,
    Updated,
    Skipped,
}

impl From<&DedupResult> for UpsertOutcome {
    fn from(result: &DedupResult) -> Self {
        if result.is_new {
            Self::New
        } else {
            Self::Updated
        }
    }
}

/// Derives an entry identity from its URL
///
/// If the path starts with `path_prefix` (for example `/games/`), the segment
/// right after it is the identity. Otherwise the first purely numeric path
/// segment is used.
///
/// # Example
///
/// ```
/// use catalog_sentinel::catalog::identity_from_url;
/// use url::Url;
///
/// let url = Url::parse("https://example.com/games/1818/Some-Title").unwrap();
/// assert_eq!(identity_from_url(&url, "/games/"), Some("1818".to_string()));
/// ```
pub fn identity_from_url(url: &Url, path_prefix: &str) -> Option<String> {
    if !path_prefix.is_empty() {
        if let Some(rest) = url.path().strip_prefix(path_prefix) {
            return rest
                .split('/')
                .find(|segment| !segment.is_empty())
                .map(str::to_string);
        }
    }

    url.path_segments()?
        .find(|segment| !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
}
