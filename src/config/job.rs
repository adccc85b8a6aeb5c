use crate::config::parser::hash_content;
use crate::config::types::Config;
use crate::config::validation::validate;
use crate::url::{normalize_url, registrable_domain};
use crate::ConfigError;
use regex::Regex;
use std::time::Duration;
use url::Url;

/// Immutable description of one crawl
///
/// Built once from a validated [`Config`] and shared read-only by every
/// worker. Seeds are already normalized, patterns already compiled and the
/// domain whitelist already inferred.
#[derive(Debug, Clone)]
pub struct CrawlJob {
    pub seeds: Vec<Url>,
    /// Lowercased domains; a host is in scope when it equals one of these or is a subdomain of one
    pub allowed_domains: Vec<String>,
    pub include_patterns: Vec<Regex>,
    pub exclude_patterns: Vec<Regex>,
    pub max_pages: usize,
    pub max_depth: u32,
    pub concurrency: usize,
    pub per_host_rate: f64,
    pub timeout: Duration,
    /// Full User-Agent header value
    pub user_agent: String,
    /// Product token matched against robots.txt groups
    pub robots_agent: String,
    pub respect_robots: bool,
    pub use_sitemaps: bool,
    pub render_js: bool,
    pub store_html: bool,
    pub resume: bool,
    pub database_path: String,
    pub config_hash: String,
}

impl CrawlJob {
    /// Validates the configuration and freezes it into a job
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        validate(config)?;

        let crawler = &config.crawler;

        let seeds = crawler
            .seeds
            .iter()
            .map(|s| {
                normalize_url(s)
                    .map_err(|e| ConfigError::InvalidUrl(format!("Seed '{}': {}", s, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut allowed_domains: Vec<String> = crawler
            .allowed_domains
            .iter()
            .map(|d| d.trim_start_matches("*.").to_lowercase())
            .collect();

        if allowed_domains.is_empty() {
            for seed in &seeds {
                if let Some(domain) = seed.host_str().map(registrable_domain) {
                    if !allowed_domains.contains(&domain) {
                        allowed_domains.push(domain);
                    }
                }
            }
        }

        let include_patterns = compile_patterns(&crawler.include_patterns)?;
        let exclude_patterns = compile_patterns(&crawler.exclude_patterns)?;

        let serialized = toml::to_string(config)
            .map_err(|e| ConfigError::Validation(format!("Cannot serialize config: {}", e)))?;

        Ok(Self {
            seeds,
            allowed_domains,
            include_patterns,
            exclude_patterns,
            max_pages: crawler.max_pages,
            max_depth: crawler.max_depth,
            concurrency: crawler.concurrency,
            per_host_rate: crawler.per_host_rate,
            timeout: Duration::from_secs(crawler.timeout_seconds),
            user_agent: config.user_agent.header_value(),
            robots_agent: config.user_agent.crawler_name.clone(),
            respect_robots: crawler.respect_robots,
            use_sitemaps: crawler.use_sitemaps,
            render_js: crawler.render_js,
            store_html: config.output.store_html,
            resume: crawler.resume,
            database_path: config.output.database_path.clone(),
            config_hash: hash_content(&serialized),
        })
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p)
                .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", p, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn test_whitelist_inferred_from_seeds() {
        let config = test_config(vec![
            "https://www.example.com/start".to_string(),
            "https://blog.example.com/".to_string(),
            "https://shop.example.co.uk/".to_string(),
        ]);
        let job = CrawlJob::from_config(&config).unwrap();

        assert_eq!(job.allowed_domains, vec!["example.com", "example.co.uk"]);
    }

    #[test]
    fn test_explicit_whitelist_wins() {
        let mut config = test_config(vec!["https://www.example.com/".to_string()]);
        config.crawler.allowed_domains = vec!["Docs.Example.com".to_string(), "*.other.org".to_string()];
        let job = CrawlJob::from_config(&config).unwrap();

        assert_eq!(job.allowed_domains, vec!["docs.example.com", "other.org"]);
    }

    #[test]
    fn test_seeds_are_normalized() {
        let config = test_config(vec!["HTTPS://Example.COM:443/a//b/../c/#top".to_string()]);
        let job = CrawlJob::from_config(&config).unwrap();

        assert_eq!(job.seeds[0].as_str(), "https://example.com/a/c");
    }

    #[test]
    fn test_user_agent_and_robots_token() {
        let config = test_config(vec!["https://example.com/".to_string()]);
        let job = CrawlJob::from_config(&config).unwrap();

        assert_eq!(
            job.user_agent,
            "TestHarvester/1.0 (+https://example.com/about; admin@example.com)"
        );
        assert_eq!(job.robots_agent, "TestHarvester");
        assert_eq!(job.timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_hash_tracks_config_changes() {
        let config = test_config(vec!["https://example.com/".to_string()]);
        let mut other = config.clone();
        other.crawler.max_pages = 7;

        let a = CrawlJob::from_config(&config).unwrap();
        let b = CrawlJob::from_config(&config).unwrap();
        let c = CrawlJob::from_config(&other).unwrap();

        assert_eq!(a.config_hash, b.config_hash);
        assert_ne!(a.config_hash, c.config_hash);
    }

    #[test]
    fn test_no_seeds_rejected() {
        let config = test_config(Vec::new());
        assert!(matches!(
            CrawlJob::from_config(&config),
            Err(ConfigError::NoSeeds)
        ));
    }
}
