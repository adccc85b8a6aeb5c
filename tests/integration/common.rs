//! Shared helpers for the integration tests

use std::path::Path;
use std::sync::Arc;
use sumi_harvest::config::{Config, CrawlJob, CrawlerConfig, OutputConfig, UserAgentConfig};
use sumi_harvest::crawler::{CrawlReport, Orchestrator};
use sumi_harvest::storage::SqliteStorage;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A fast, polite-enough configuration for a local mock server
pub fn test_config(seeds: Vec<String>, db_path: &Path) -> Config {
    Config {
        crawler: CrawlerConfig {
            seeds,
            allowed_domains: vec![],
            include_patterns: vec![],
            exclude_patterns: vec![],
            max_pages: 100,
            max_depth: 2,
            concurrency: 4,
            per_host_rate: 500.0,
            timeout_seconds: 5,
            respect_robots: true,
            use_sitemaps: false,
            render_js: false,
            resume: true,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: db_path.to_string_lossy().into_owned(),
            store_html: true,
        },
    }
}

/// HTML page with one anchor per href
pub fn html_page(title: &str, hrefs: &[String]) -> String {
    let anchors: String = hrefs
        .iter()
        .map(|href| format!(r#"<a href="{}">{}</a>"#, href, href))
        .collect();
    format!(
        "<html><head><title>{}</title></head><body><p>{}</p>{}</body></html>",
        title, title, anchors
    )
}

pub async fn mount_html(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8"))
        .mount(server)
        .await;
}

pub async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

/// Number of requests the server saw for `route`
pub async fn hits(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}

/// Requests for anything but robots.txt
pub async fn page_hits(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() != "/robots.txt")
        .count()
}

pub async fn run_crawl(config: &Config) -> (CrawlReport, Arc<SqliteStorage>) {
    let job = CrawlJob::from_config(config).expect("valid config");
    let storage = Arc::new(
        SqliteStorage::new(Path::new(&config.output.database_path)).expect("open database"),
    );
    let report = Orchestrator::new(job, storage.clone())
        .expect("orchestrator")
        .run()
        .await
        .expect("crawl");
    (report, storage)
}
