//! Integration tests for the crawl cycle
//!
//! These tests use wiremock to stand in for the listing source and the bot
//! endpoint, and run full crawl cycles against a SQLite database on disk.

use catalog_sentinel::config::{CrawlerConfig, SourceConfig, UserAgentConfig};
use catalog_sentinel::crawler::{Coordinator, FetchClient, RetryPolicy};
use catalog_sentinel::notify::{HttpMessageSink, Notifier, SubscriberRegistry};
use catalog_sentinel::render::{build_http_client, HttpRenderer};
use catalog_sentinel::storage::{CatalogStore, SqliteStore};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EMPTY_PAGE: &str = "<html><head><title>Catalog</title></head><body></body></html>";

fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

fn source_config(base_url: &str, listing_path: &str) -> SourceConfig {
    SourceConfig {
        listing_url: format!("{}{}", base_url, listing_path),
        sort: "popular".to_string(),
        entry_url_template: format!("{}/games/{{id}}", base_url),
        payload_url_fragment: "/api/".to_string(),
        entry_selectors: vec!["[data-game-id]".to_string(), "a[href*='/games/']".to_string()],
        navigation_timeout_ms: 5_000,
        payload_timeout_ms: 1_000,
    }
}

fn crawler_config(keys: &[&str]) -> CrawlerConfig {
    CrawlerConfig {
        concurrency: 3,
        page_size: 2,
        page_delay_ms: 0,
        index_keys: keys.iter().map(|k| k.to_string()).collect(),
        ..CrawlerConfig::default()
    }
}

/// Builds a coordinator wired to the mock server, without retry delays
fn create_coordinator(
    server: &MockServer,
    listing_path: &str,
    keys: &[&str],
    store: Arc<SqliteStore>,
    subscribers: &[&str],
) -> Coordinator {
    let client = build_http_client(&user_agent()).expect("Failed to build client");
    let renderer = Arc::new(HttpRenderer::new(client.clone()));
    let source = FetchClient::new(renderer, source_config(&server.uri(), listing_path))
        .with_retry_policy(RetryPolicy::immediate(3));

    let endpoint = url::Url::parse(&format!("{}/bot/sendMessage", server.uri()))
        .expect("Failed to parse bot endpoint");
    let notifier = Notifier::new(
        Arc::new(SubscriberRegistry::from_ids(subscribers.iter().copied())),
        Arc::new(HttpMessageSink::new(client, endpoint)),
    );

    Coordinator::new(
        &crawler_config(keys),
        Arc::new(source),
        store,
        Arc::new(notifier),
    )
}

fn open_store(dir: &Path) -> Arc<SqliteStore> {
    Arc::new(SqliteStore::new(&dir.join("catalog.db")).expect("Failed to open store"))
}

/// Serves `body` for one page of one key
async fn mount_page(server: &MockServer, listing_path: &str, key: &str, page: u32, body: String) {
    Mock::given(method("GET"))
        .and(path(listing_path))
        .and(query_param("letter", key))
        .and(query_param("page", page.to_string()))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

/// Every other listing page is empty
async fn mount_empty_pages(server: &MockServer, listing_path: &str) {
    Mock::given(method("GET"))
        .and(path(listing_path))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(EMPTY_PAGE, "text/html"),
        )
        .mount(server)
        .await;
}

fn listing_html(games: &[(&str, &str)]) -> String {
    let cards: String = games
        .iter()
        .map(|(id, title)| {
            format!(
                r#"<div class="card" data-game-id="{id}"><a href="/games/{id}">{title}</a></div>"#
            )
        })
        .collect();
    format!("<html><head><title>Catalog</title></head><body>{cards}</body></html>")
}

#[tokio::test]
async fn test_cycle_stores_and_notifies_new_entries() {
    let server = MockServer::start().await;
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");

    mount_page(
        &server,
        "/games",
        "а",
        1,
        listing_html(&[("101", "Alpha"), ("102", "Beta")]),
    )
    .await;
    mount_empty_pages(&server, "/games").await;

    // Two new entries, one subscriber: two messages over both cycles
    Mock::given(method("POST"))
        .and(path("/bot/sendMessage"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let store = open_store(temp_dir.path());
    let coordinator = create_coordinator(&server, "/games", &["а"], store.clone(), &["1001"]);

    let stats = coordinator.run_cycle(&CancellationToken::new()).await;

    assert_eq!(stats.total_seen, 2);
    assert_eq!(stats.new_count, 2);
    assert_eq!(stats.error_count, 0);
    assert_eq!(stats.total_records, Some(2));
    assert!(!stats.cancelled);

    let record = store
        .find_by_identity("101")
        .expect("Failed to query store")
        .expect("Entry 101 should be stored");
    assert_eq!(record.title, "Alpha");
    assert_eq!(record.url, format!("{}/games/101", server.uri()));

    // Nothing is new the second time around
    let stats = coordinator.run_cycle(&CancellationToken::new()).await;
    assert_eq!(stats.new_count, 0);
    assert_eq!(stats.updated_count, 2);
    assert_eq!(store.count_all().await.unwrap(), 2);
}

#[tokio::test]
async fn test_scraped_cards_take_precedence_over_markup() {
    let server = MockServer::start().await;
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");

    // The card attributes disagree with what the bare anchor would give
    let html = concat!(
        r#"<html><head><title>Catalog</title></head><body>"#,
        r#"<div class="card" data-game-id="uid-7" data-title="Seventh Heaven">"#,
        r#"<a href="/games/7">7th</a></div>"#,
        r#"</body></html>"#
    );
    mount_page(&server, "/games", "s", 1, html.to_string()).await;
    mount_empty_pages(&server, "/games").await;

    let store = open_store(temp_dir.path());
    let coordinator = create_coordinator(&server, "/games", &["s"], store.clone(), &[]);

    let stats = coordinator.run_cycle(&CancellationToken::new()).await;
    assert_eq!(stats.new_count, 1);

    let record = store
        .find_by_identity("uid-7")
        .expect("Failed to query store")
        .expect("Entry uid-7 should be stored");
    assert_eq!(record.title, "Seventh Heaven");
    assert_eq!(record.url, format!("{}/games/7", server.uri()));
    assert!(store
        .find_by_identity("7")
        .expect("Failed to query store")
        .is_none());
}

#[tokio::test]
async fn test_json_listing_synthesizes_entry_urls() {
    let server = MockServer::start().await;
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/api/games"))
        .and(query_param("letter", "b"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {
                "games": [
                    {"place_id": 5001, "name": "Bravo", "playing": 40},
                    {"place_id": 5002, "name": "Bingo"}
                ]
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/games"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"games": []})))
        .mount(&server)
        .await;

    let store = open_store(temp_dir.path());
    let coordinator = create_coordinator(&server, "/api/games", &["b"], store.clone(), &[]);

    let stats = coordinator.run_cycle(&CancellationToken::new()).await;

    assert_eq!(stats.new_count, 2);
    let record = store
        .find_by_identity("5001")
        .expect("Failed to query store")
        .expect("Entry 5001 should be stored");
    assert_eq!(record.url, format!("{}/games/5001", server.uri()));
    assert_eq!(record.concurrent_users, Some(40));
}

#[tokio::test]
async fn test_unavailable_key_does_not_stop_cycle() {
    let server = MockServer::start().await;
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/games"))
        .and(query_param("letter", "b"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_page(&server, "/games", "c", 1, listing_html(&[("301", "Charlie")])).await;
    mount_empty_pages(&server, "/games").await;

    let store = open_store(temp_dir.path());
    let coordinator = create_coordinator(&server, "/games", &["a", "b", "c"], store, &[]);

    let stats = coordinator.run_cycle(&CancellationToken::new()).await;

    assert_eq!(stats.error_count, 1);
    assert_eq!(stats.new_count, 1);
    assert_eq!(stats.index_key.as_deref(), Some("c"));
}

#[tokio::test]
async fn test_database_survives_reopen() {
    let server = MockServer::start().await;
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");

    mount_page(&server, "/games", "a", 1, listing_html(&[("1", "One"), ("2", "Two")])).await;
    mount_empty_pages(&server, "/games").await;

    {
        let store = open_store(temp_dir.path());
        let coordinator = create_coordinator(&server, "/games", &["a"], store, &[]);
        coordinator.run_cycle(&CancellationToken::new()).await;
    }

    let store = open_store(temp_dir.path());
    assert_eq!(store.count_records().unwrap(), 2);

    let cycles = store.recent_cycles(5).unwrap();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].new_count, 2);
    assert_eq!(cycles[0].total_records, Some(2));
}
