//! Memoized per-origin robots.txt cache
//!
//! Each origin gets a `OnceCell` the first time it is asked for. The first
//! caller fetches and parses robots.txt inside `get_or_init`; concurrent
//! callers for the same origin wait on the same cell, so an origin is fetched
//! at most once for the lifetime of the cache.

use crate::robots::RobotsPolicy;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use url::Url;

/// Timeout for a robots.txt request
pub const ROBOTS_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-origin robots.txt registry owned by one crawl
pub struct RobotsCache {
    client: reqwest::Client,
    agent: String,
    timeout: Duration,
    policies: DashMap<String, Arc<OnceCell<Arc<RobotsPolicy>>>>,
}

impl RobotsCache {
    /// Creates an empty cache
    ///
    /// `agent` is the product token matched against `User-agent:` groups; the
    /// client already carries the full User-Agent header.
    pub fn new(client: reqwest::Client, agent: impl Into<String>) -> Self {
        Self {
            client,
            agent: agent.into(),
            timeout: ROBOTS_TIMEOUT,
            policies: DashMap::new(),
        }
    }

    /// Returns the policy for an origin, fetching it on first use
    pub async fn policy_for(&self, origin: &str) -> Arc<RobotsPolicy> {
        let cell = self
            .policies
            .entry(origin.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        cell.get_or_init(|| self.fetch(origin)).await.clone()
    }

    /// Checks whether `url` may be fetched under the robots.txt of `origin`
    pub async fn is_allowed(&self, origin: &str, url: &Url) -> bool {
        self.policy_for(origin)
            .await
            .is_allowed(url.as_str(), &self.agent)
    }

    /// Sitemap URLs declared by the robots.txt of `origin`
    pub async fn sitemaps_for(&self, origin: &str) -> Vec<String> {
        self.policy_for(origin).await.sitemaps().to_vec()
    }

    /// Number of origins with a cached (or in-progress) policy
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    async fn fetch(&self, origin: &str) -> Arc<RobotsPolicy> {
        let robots_url = format!("{}/robots.txt", origin.trim_end_matches('/'));
        debug!("Fetching {}", robots_url);

        let response = match self
            .client
            .get(&robots_url)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("robots.txt unreachable for {}, allowing all: {}", origin, e);
                return Arc::new(RobotsPolicy::allow_all());
            }
        };

        if !response.status().is_success() {
            debug!(
                "robots.txt for {} returned {}, allowing all",
                origin,
                response.status()
            );
            return Arc::new(RobotsPolicy::allow_all());
        }

        match response.text().await {
            Ok(body) => Arc::new(RobotsPolicy::from_content(&body)),
            Err(e) => {
                warn!("robots.txt body unreadable for {}, allowing all: {}", origin, e);
                Arc::new(RobotsPolicy::allow_all())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cache() -> RobotsCache {
        RobotsCache::new(reqwest::Client::new(), "TestBot")
    }

    #[tokio::test]
    async fn test_disallow_respected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("User-agent: *\nDisallow: /private\nSitemap: /sm.xml"),
            )
            .mount(&server)
            .await;

        let cache = cache();
        let origin = server.uri();
        let open = Url::parse(&format!("{}/public", origin)).unwrap();
        let closed = Url::parse(&format!("{}/private/x", origin)).unwrap();

        assert!(cache.is_allowed(&origin, &open).await);
        assert!(!cache.is_allowed(&origin, &closed).await);
        assert_eq!(cache.sitemaps_for(&origin).await, vec!["/sm.xml".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_robots_allows_all() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let cache = cache();
        let url = Url::parse(&format!("{}/anything", server.uri())).unwrap();
        assert!(cache.is_allowed(&server.uri(), &url).await);
        assert!(cache.sitemaps_for(&server.uri()).await.is_empty());
    }

    #[tokio::test]
    async fn test_network_error_allows_all() {
        // Nothing listens on port 9 (discard) in the test environment
        let origin = "http://127.0.0.1:9";
        let url = Url::parse("http://127.0.0.1:9/secret").unwrap();

        let cache = cache();
        assert!(cache.is_allowed(origin, &url).await);
    }

    #[tokio::test]
    async fn test_fetched_once_under_concurrency() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("User-agent: *\nDisallow: /no")
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let cache = Arc::new(cache());
        let origin = server.uri();

        let mut tasks = Vec::new();
        for i in 0..8 {
            let cache = cache.clone();
            let origin = origin.clone();
            tasks.push(tokio::spawn(async move {
                let url = Url::parse(&format!("{}/page/{}", origin, i)).unwrap();
                cache.is_allowed(&origin, &url).await
            }));
        }

        for task in tasks {
            assert!(task.await.unwrap());
        }
        assert_eq!(cache.len(), 1);
    }
}
