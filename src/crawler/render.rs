//! Rendered fetch through a headless browser
//!
//! A plain request runs first and supplies status, final URL and headers.
//! Only successful HTML responses are then loaded in Chromium/Chrome with
//! `--dump-dom`, and the rendered DOM replaces the body. Which strategy a
//! crawl uses is decided once, when the orchestrator is built.

use crate::crawler::fetcher::{
    ContentKind, FetchResponse, FetchStrategy, HttpFetcher, TransportError,
};
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Browser executables searched for on `PATH`, in order
pub const BROWSER_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];

/// Headless-browser fetch strategy
pub struct RenderedFetcher {
    browser: PathBuf,
    http: HttpFetcher,
    user_agent: String,
    timeout: Duration,
}

impl RenderedFetcher {
    pub fn new(
        browser: impl Into<PathBuf>,
        client: Client,
        user_agent: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            browser: browser.into(),
            http: HttpFetcher::new(client),
            user_agent: user_agent.into(),
            timeout,
        }
    }

    /// Finds the first available browser among `candidates`
    pub fn discover(
        candidates: &[&str],
        client: Client,
        user_agent: &str,
        timeout: Duration,
    ) -> Option<Self> {
        candidates
            .iter()
            .find_map(|name| which::which(name).ok())
            .map(|browser| Self::new(browser, client, user_agent, timeout))
    }

    pub fn browser(&self) -> &Path {
        &self.browser
    }

    /// DOM of `url` after scripts ran
    async fn render(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        let user_agent = format!("--user-agent={}", self.user_agent);

        let output = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(&self.browser)
                .args([
                    "--headless",
                    "--no-sandbox",
                    "--disable-gpu",
                    "--disable-dev-shm-usage",
                    user_agent.as_str(),
                    "--dump-dom",
                    url.as_str(),
                ])
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| TransportError::Timeout(format!("browser timed out after {:?}", self.timeout)))?
        .map_err(|e| TransportError::Render(format!("failed to launch browser: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransportError::Render(format!(
                "browser exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl FetchStrategy for RenderedFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, TransportError> {
        let response = self.http.fetch(url).await?;
        if !response.is_success() || response.kind() != ContentKind::Html {
            debug!("Not rendering {} (status {})", url, response.status);
            return Ok(response);
        }

        match self.render(&response.final_url).await {
            Ok(dom) => Ok(FetchResponse {
                body: dom,
                ..response
            }),
            Err(e) => {
                warn!("Rendering {} failed, keeping the plain response: {}", url, e);
                Ok(response)
            }
        }
    }

    fn name(&self) -> &'static str {
        "rendered"
    }
}

/// Picks the fetch strategy for a crawl
///
/// Rendering is used only when requested and a browser is installed;
/// otherwise the plain HTTP fetcher is returned.
pub fn select_strategy(
    render_js: bool,
    client: Client,
    user_agent: &str,
    timeout: Duration,
) -> Arc<dyn FetchStrategy> {
    select_from(BROWSER_CANDIDATES, render_js, client, user_agent, timeout)
}

fn select_from(
    candidates: &[&str],
    render_js: bool,
    client: Client,
    user_agent: &str,
    timeout: Duration,
) -> Arc<dyn FetchStrategy> {
    if render_js {
        match RenderedFetcher::discover(candidates, client.clone(), user_agent, timeout) {
            Some(rendered) => {
                info!("Rendering pages with {}", rendered.browser().display());
                return Arc::new(rendered);
            }
            None => warn!("No headless browser found on PATH, using plain HTTP fetch"),
        }
    }

    Arc::new(HttpFetcher::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::coordinator::build_record;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_plain_when_rendering_not_requested() {
        let strategy = select_from(
            BROWSER_CANDIDATES,
            false,
            Client::new(),
            "TestBot",
            Duration::from_secs(5),
        );
        assert_eq!(strategy.name(), "http");
    }

    #[test]
    fn test_falls_back_when_browser_missing() {
        let strategy = select_from(
            &["definitely-not-a-browser-4f1c"],
            true,
            Client::new(),
            "TestBot",
            Duration::from_secs(5),
        );
        assert_eq!(strategy.name(), "http");
    }

    #[cfg(unix)]
    fn fake_browser(dir: &Path, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let browser = dir.join("fake-browser");
        std::fs::write(&browser, script).unwrap();
        std::fs::set_permissions(&browser, std::fs::Permissions::from_mode(0o755)).unwrap();
        browser
    }

    /// Prints a page naming the URL it was asked to load (the last argument)
    #[cfg(unix)]
    const ECHO_BROWSER: &str = "#!/bin/sh\nfor last; do :; done\n\
        echo \"<html><head><title>Rendered</title></head><body>$last</body></html>\"\n";

    #[cfg(unix)]
    fn rendered(browser: &Path) -> RenderedFetcher {
        RenderedFetcher::new(browser, Client::new(), "TestBot/1.0", Duration::from_secs(5))
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rendered_dom_replaces_html_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/app"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/app"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<title>Plain</title>", "text/html"),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = rendered(&fake_browser(dir.path(), ECHO_BROWSER));
        let url = Url::parse(&format!("{}/old", server.uri())).unwrap();
        let response = fetcher.fetch(&url).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.final_url.path(), "/app");
        assert_eq!(response.content_type(), Some("text/html"));
        let body = String::from_utf8_lossy(&response.body);
        assert!(body.contains("<title>Rendered</title>"));
        // The browser is pointed at the post-redirect URL
        assert!(body.contains(&format!("{}/app", server.uri())));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_error_status_is_kept_and_not_rendered() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(
                ResponseTemplate::new(404).set_body_raw("<a href='/hidden'>x</a>", "text/html"),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = rendered(&fake_browser(dir.path(), ECHO_BROWSER));
        let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
        let response = fetcher.fetch(&url).await.unwrap();

        assert_eq!(response.status, 404);
        assert!(!String::from_utf8_lossy(&response.body).contains("Rendered"));

        let (record, links) = build_record(&url, &url, response, true);
        assert_eq!(record.error.as_deref(), Some("http_404"));
        assert!(links.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_pdf_is_passed_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/report.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF-1.4", "application/pdf"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = rendered(&fake_browser(dir.path(), ECHO_BROWSER));
        let url = Url::parse(&format!("{}/report.pdf", server.uri())).unwrap();
        let response = fetcher.fetch(&url).await.unwrap();

        assert_eq!(response.kind(), ContentKind::Pdf);
        assert_eq!(response.body, b"%PDF-1.4".to_vec());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_browser_failure_keeps_plain_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/app"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<title>Plain</title>", "text/html"),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let broken = fake_browser(dir.path(), "#!/bin/sh\necho crashed >&2\nexit 3\n");
        let fetcher = rendered(&broken);
        let url = Url::parse(&format!("{}/app", server.uri())).unwrap();

        let err = fetcher.render(&url).await.unwrap_err();
        assert!(matches!(err, TransportError::Render(_)));
        assert!(!err.is_transient());

        let response = fetcher.fetch(&url).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(String::from_utf8_lossy(&response.body), "<title>Plain</title>");
    }
}
