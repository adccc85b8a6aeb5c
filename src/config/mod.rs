//! Configuration module for Sumi-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and turns a validated [`Config`] into an immutable [`CrawlJob`].
//!
//! # Example
//!
//! ```no_run
//! use sumi_harvest::config::load_job;
//! use std::path::Path;
//!
//! let job = load_job(Path::new("harvest.toml")).unwrap();
//! println!("Crawling {} seeds, max depth {}", job.seeds.len(), job.max_depth);
//! ```

mod job;
mod parser;
mod types;
mod validation;

pub use job::CrawlJob;
pub use types::{Config, CrawlerConfig, OutputConfig, UserAgentConfig};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, load_job, parse_config};
pub use validation::validate;

/// Builds a valid configuration around the given seeds, for tests across the crate
#[cfg(test)]
pub(crate) fn test_config(seeds: Vec<String>) -> Config {
    Config {
        crawler: CrawlerConfig {
            seeds,
            allowed_domains: Vec::new(),
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            max_pages: 500,
            max_depth: 2,
            concurrency: 8,
            per_host_rate: 1.0,
            timeout_seconds: 20,
            respect_robots: true,
            use_sitemaps: false,
            render_js: false,
            resume: true,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestHarvester".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: ":memory:".to_string(),
            store_html: true,
        },
    }
}
