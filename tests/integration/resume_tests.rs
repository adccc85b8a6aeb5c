//! Resume behaviour across runs sharing one database

use crate::common::{hits, html_page, mount_html, mount_robots, page_hits, run_crawl, test_config};
use std::path::Path;
use sumi_harvest::normalize_url;
use sumi_harvest::storage::{PageRecord, RunStatus, SqliteStorage, Storage};
use tempfile::TempDir;
use wiremock::MockServer;

fn key(server: &MockServer, route: &str) -> String {
    normalize_url(&format!("{}{}", server.uri(), route))
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_stored_seed_not_refetched_but_links_followed() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("resume.db");
    mount_robots(&server, "User-agent: *\nAllow: /").await;
    mount_html(&server, "/", html_page("Home", &["/b".to_string()])).await;
    mount_html(&server, "/b", html_page("B", &[])).await;

    {
        let storage = SqliteStorage::new(&db).unwrap();
        let mut home = PageRecord::new(&key(&server, "/"));
        home.status = Some(200);
        home.title = "Home".to_string();
        home.links = vec![key(&server, "/b")];
        storage.upsert_page(&home).unwrap();
    }

    let config = test_config(vec![format!("{}/", server.uri())], &db);
    let (report, storage) = run_crawl(&config).await;

    assert_eq!(hits(&server, "/").await, 0);
    assert_eq!(hits(&server, "/b").await, 1);
    assert_eq!(report.pages_processed, 1);
    assert_eq!(storage.count_pages().unwrap(), 2);
}

#[tokio::test]
async fn test_interrupted_budget_continues_in_next_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("continue.db");
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    let children: Vec<String> = ["/a", "/b", "/c"].iter().map(|s| s.to_string()).collect();
    mount_html(&server, "/", html_page("Home", &children)).await;
    for child in &children {
        mount_html(&server, child, html_page(child, &[])).await;
    }

    let mut config = test_config(vec![format!("{}/", server.uri())], &db);
    config.crawler.max_pages = 2;
    let (first, _) = run_crawl(&config).await;
    assert_eq!(first.pages_processed, 2);

    config.crawler.max_pages = 100;
    let (second, storage) = run_crawl(&config).await;
    assert_eq!(second.pages_processed, 2);
    assert_eq!(storage.count_pages().unwrap(), 4);

    // Every page was fetched exactly once across both runs
    assert_eq!(page_hits(&server).await, 4);
    for route in ["/", "/a", "/b", "/c"] {
        assert_eq!(hits(&server, route).await, 1, "{} fetched more than once", route);
    }

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.pages_processed, 2);
}

#[tokio::test]
async fn test_fresh_run_refetches_and_overwrites() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("fresh.db");
    mount_robots(&server, "User-agent: *\nAllow: /").await;
    mount_html(&server, "/", html_page("Home", &[])).await;

    let mut config = test_config(vec![format!("{}/", server.uri())], &db);
    run_crawl(&config).await;

    config.crawler.resume = false;
    let (report, storage) = run_crawl(&config).await;

    assert_eq!(report.pages_processed, 1);
    assert_eq!(hits(&server, "/").await, 2);
    assert_eq!(storage.count_pages().unwrap(), 1);
}

#[tokio::test]
async fn test_database_reopens_after_crawl() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("nested").join("reopen.db");
    mount_robots(&server, "User-agent: *\nAllow: /").await;
    mount_html(&server, "/", html_page("Home", &[])).await;

    let config = test_config(vec![format!("{}/", server.uri())], &db);
    let (_, storage) = run_crawl(&config).await;
    drop(storage);

    let reopened = SqliteStorage::new(Path::new(&db)).unwrap();
    let pages = reopened.list_pages().unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].title, "Home");
}
