//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use crate::common::{hits, html_page, mount_html, mount_robots, page_hits, run_crawl, test_config};
use std::sync::{Arc, Mutex};
use sumi_harvest::config::CrawlJob;
use sumi_harvest::crawler::{CrawlProgress, Orchestrator};
use sumi_harvest::storage::{SqliteStorage, Storage};
use sumi_harvest::{normalize_url, ConfigError};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn key(server: &MockServer, route: &str) -> String {
    normalize_url(&format!("{}{}", server.uri(), route))
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_crawl_stays_on_seed_domain() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_robots(&server, "User-agent: *\nAllow: /").await;
    mount_html(
        &server,
        "/",
        html_page("Home", &["/b".to_string(), "https://external.test/".to_string()]),
    )
    .await;
    mount_html(&server, "/b", html_page("B", &["/c".to_string()])).await;
    mount_html(&server, "/c", html_page("C", &[])).await;

    let mut config = test_config(vec![format!("{}/", server.uri())], &dir.path().join("crawl.db"));
    config.crawler.max_depth = 1;
    let (report, storage) = run_crawl(&config).await;

    assert_eq!(report.pages_processed, 2);
    assert_eq!(report.pages_with_errors, 0);
    assert_eq!(storage.count_pages().unwrap(), 2);

    let urls: Vec<String> = storage
        .list_pages()
        .unwrap()
        .into_iter()
        .map(|p| p.url)
        .collect();
    assert!(urls.contains(&key(&server, "/")));
    assert!(urls.contains(&key(&server, "/b")));
    assert!(!urls.iter().any(|u| u.contains("external.test")));

    // Depth 1 stops before /c
    assert_eq!(hits(&server, "/c").await, 0);

    let home = storage.get_page(&key(&server, "/")).unwrap().unwrap();
    assert_eq!(home.title, "Home");
    assert_eq!(home.status, Some(200));
    assert!(home.html.is_some());
    assert!(home.links.contains(&"https://external.test/".to_string()));
}

#[tokio::test]
async fn test_page_budget_is_hard_stop() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    let links: Vec<String> = (0..50).map(|i| format!("/page{}", i)).collect();
    mount_html(&server, "/", html_page("Hub", &links)).await;
    for link in &links {
        mount_html(&server, link, html_page(link, &links)).await;
    }

    let mut config = test_config(vec![format!("{}/", server.uri())], &dir.path().join("budget.db"));
    config.crawler.max_pages = 5;
    config.crawler.max_depth = 3;
    let (report, storage) = run_crawl(&config).await;

    assert_eq!(report.pages_processed, 5);
    assert_eq!(storage.count_pages().unwrap(), 5);
    assert_eq!(page_hits(&server).await, 5);
}

#[tokio::test]
async fn test_robots_disallow_is_silently_dropped() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_robots(&server, "User-agent: *\nDisallow: /private").await;
    mount_html(
        &server,
        "/",
        html_page("Home", &["/private/secret".to_string(), "/public".to_string()]),
    )
    .await;
    mount_html(&server, "/public", html_page("Public", &[])).await;
    mount_html(&server, "/private/secret", html_page("Secret", &[])).await;

    let config = test_config(vec![format!("{}/", server.uri())], &dir.path().join("robots.db"));
    let (report, storage) = run_crawl(&config).await;

    assert_eq!(report.pages_processed, 2);
    assert_eq!(report.pages_skipped, 1);
    assert_eq!(report.pages_with_errors, 0);
    assert_eq!(hits(&server, "/private/secret").await, 0);
    assert!(storage
        .get_page(&key(&server, "/private/secret"))
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_progress_reported_for_robots_dropped_items() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_robots(&server, "User-agent: *\nDisallow: /private").await;
    mount_html(
        &server,
        "/",
        html_page("Home", &["/private/secret".to_string(), "/public".to_string()]),
    )
    .await;
    mount_html(&server, "/public", html_page("Public", &[])).await;

    let config = test_config(vec![format!("{}/", server.uri())], &dir.path().join("progress.db"));
    let job = CrawlJob::from_config(&config).unwrap();
    let storage = Arc::new(SqliteStorage::new(&dir.path().join("progress.db")).unwrap());
    let events = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&events);
    let report = Orchestrator::new(job, storage)
        .unwrap()
        .with_progress(Arc::new(move |p: &CrawlProgress| {
            sink.lock().unwrap().push(p.clone());
        }))
        .run()
        .await
        .unwrap();

    let events = events.lock().unwrap();
    assert_eq!(report.pages_skipped, 1);
    assert_eq!(events.len() as u64, report.pages_processed + report.pages_skipped);
    assert!(events
        .iter()
        .any(|p| p.current_url == key(&server, "/private/secret")));
    // Whichever item finished last saw nothing else in flight
    assert!(events.iter().any(|p| p.in_progress == 0));
}

#[tokio::test]
async fn test_robots_failure_means_allow_all() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_html(&server, "/", html_page("Home", &["/private".to_string()])).await;
    mount_html(&server, "/private", html_page("Private", &[])).await;

    let config = test_config(vec![format!("{}/", server.uri())], &dir.path().join("open.db"));
    let (report, _) = run_crawl(&config).await;

    assert_eq!(report.pages_processed, 2);
    assert_eq!(report.pages_skipped, 0);
}

#[tokio::test]
async fn test_robots_fetched_once_under_concurrency() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
        .expect(1)
        .mount(&server)
        .await;

    let links: Vec<String> = (0..12).map(|i| format!("/p{}", i)).collect();
    mount_html(&server, "/", html_page("Hub", &links)).await;
    for link in &links {
        mount_html(&server, link, html_page(link, &[])).await;
    }

    let mut config = test_config(vec![format!("{}/", server.uri())], &dir.path().join("once.db"));
    config.crawler.concurrency = 8;
    let (report, _) = run_crawl(&config).await;

    assert_eq!(report.pages_processed, 13);
    server.verify().await;
}

#[tokio::test]
async fn test_error_statuses_and_non_html_content() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_robots(&server, "User-agent: *\nAllow: /").await;
    mount_html(
        &server,
        "/",
        html_page(
            "Home",
            &[
                "/missing".to_string(),
                "/report.pdf".to_string(),
                "/data.json".to_string(),
            ],
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_raw("<a href='/hidden'>x</a>", "text/html"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF-1.4 truncated", "application/pdf"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"a": 1}"#, "application/json"))
        .mount(&server)
        .await;

    let config = test_config(vec![format!("{}/", server.uri())], &dir.path().join("kinds.db"));
    let (report, storage) = run_crawl(&config).await;

    assert_eq!(report.pages_processed, 4);
    assert_eq!(report.pages_with_errors, 1);

    // 4xx is recorded once, never retried, never expanded
    let missing = storage.get_page(&key(&server, "/missing")).unwrap().unwrap();
    assert_eq!(missing.status, Some(404));
    assert_eq!(missing.error.as_deref(), Some("http_404"));
    assert!(missing.links.is_empty());
    assert_eq!(hits(&server, "/missing").await, 1);
    assert_eq!(hits(&server, "/hidden").await, 0);

    // A broken PDF degrades to an empty extraction, not an error
    let pdf = storage.get_page(&key(&server, "/report.pdf")).unwrap().unwrap();
    assert!(pdf.error.is_none());
    assert!(pdf.text.is_empty());
    assert!(pdf.html.is_none());

    let json = storage.get_page(&key(&server, "/data.json")).unwrap().unwrap();
    assert_eq!(json.content_type.as_deref(), Some("application/json"));
    assert!(json.text.is_empty());
}

#[tokio::test]
async fn test_redirect_target_not_fetched_twice() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_robots(&server, "User-agent: *\nAllow: /").await;
    mount_html(&server, "/", html_page("Home", &["/old".to_string()])).await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&server)
        .await;
    mount_html(&server, "/new", html_page("New", &["/new".to_string(), "/".to_string()])).await;

    let config = test_config(vec![format!("{}/", server.uri())], &dir.path().join("redirect.db"));
    let (report, storage) = run_crawl(&config).await;

    assert_eq!(report.pages_processed, 2);
    assert_eq!(hits(&server, "/new").await, 1);

    let old = storage.get_page(&key(&server, "/old")).unwrap().unwrap();
    assert_eq!(old.final_url, key(&server, "/new"));
    assert_eq!(old.title, "New");
    assert!(storage.get_page(&key(&server, "/new")).unwrap().is_none());
}

#[tokio::test]
async fn test_sitemap_urls_are_seeded() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let uri = server.uri();
    mount_robots(&server, &format!("User-agent: *\nAllow: /\nSitemap: {}/sitemap.xml", uri)).await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "<urlset><url><loc>{uri}/s1</loc></url><url><loc>{uri}/s2</loc></url></urlset>"
        )))
        .mount(&server)
        .await;
    mount_html(&server, "/", html_page("Home", &[])).await;
    mount_html(&server, "/s1", html_page("S1", &[])).await;
    mount_html(&server, "/s2", html_page("S2", &[])).await;

    let mut config = test_config(vec![format!("{}/", uri)], &dir.path().join("sitemap.db"));
    config.crawler.use_sitemaps = true;
    config.crawler.max_depth = 0;
    let (report, storage) = run_crawl(&config).await;

    assert_eq!(report.pages_processed, 3);
    assert!(storage.get_page(&key(&server, "/s2")).unwrap().is_some());
}

#[tokio::test]
async fn test_exclude_pattern_filters_links() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_robots(&server, "User-agent: *\nAllow: /").await;
    mount_html(
        &server,
        "/",
        html_page("Home", &["/docs/a".to_string(), "/docs/a/print".to_string()]),
    )
    .await;
    mount_html(&server, "/docs/a", html_page("A", &[])).await;
    mount_html(&server, "/docs/a/print", html_page("Print", &[])).await;

    let mut config = test_config(vec![format!("{}/", server.uri())], &dir.path().join("filter.db"));
    config.crawler.exclude_patterns = vec!["/print$".to_string()];
    let (report, _) = run_crawl(&config).await;

    assert_eq!(report.pages_processed, 2);
    assert_eq!(hits(&server, "/docs/a/print").await, 0);
}

#[tokio::test]
async fn test_no_seeds_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = test_config(vec![], &dir.path().join("none.db"));

    let err = CrawlJob::from_config(&config).unwrap_err();
    assert!(matches!(err, ConfigError::NoSeeds));
}
