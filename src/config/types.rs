use serde::{Deserialize, Serialize};

/// Main configuration structure for Sumi-Harvest
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Seed URLs the crawl starts from
    pub seeds: Vec<String>,

    /// Domains the crawl may visit; empty means the seeds' registrable domains
    #[serde(default)]
    pub allowed_domains: Vec<String>,

    /// Regexes a URL must match (at least one) when non-empty
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Regexes that exclude a URL; checked before include patterns
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Hard ceiling on pages fetched in one crawl
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Maximum link depth from the seeds
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Number of concurrent workers
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Requests per second allowed against any single host
    #[serde(default = "default_per_host_rate")]
    pub per_host_rate: f64,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    #[serde(default = "default_true")]
    pub respect_robots: bool,

    /// Seed the frontier from sitemaps declared in robots.txt
    #[serde(default)]
    pub use_sitemaps: bool,

    /// Fetch pages through a headless browser when one is installed
    #[serde(default)]
    pub render_js: bool,

    /// Skip URLs already present in the database
    #[serde(default = "default_true")]
    pub resume: bool,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserAgentConfig {
    /// Name of the crawler, also used as the robots.txt product token
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
    /// Formats the User-Agent header value
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    /// Keep the raw HTML of every page
    #[serde(default = "default_true")]
    pub store_html: bool,
}

fn default_max_pages() -> usize {
    500
}

fn default_max_depth() -> u32 {
    2
}

fn default_concurrency() -> usize {
    8
}

fn default_per_host_rate() -> f64 {
    1.0
}

fn default_timeout_seconds() -> u64 {
    20
}

fn default_true() -> bool {
    true
}
