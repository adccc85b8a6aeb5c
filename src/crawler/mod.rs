//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP and rendered fetching with retry logic
//! - Per-host rate limiting
//! - The shared frontier with dedup and scope filtering
//! - Sitemap seeding
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod frontier;
mod limiter;
mod render;
mod sitemap;

pub use coordinator::{fetch_and_extract, CrawlProgress, CrawlReport, Orchestrator, ProgressCallback};
pub use fetcher::{
    build_http_client, classify_content, fetch_with_retry, ContentKind, FetchResponse,
    FetchStrategy, HttpFetcher, RetryPolicy, TransportError, MAX_REDIRECTS,
};
pub use frontier::{Dispatched, Frontier, FrontierItem, FrontierSnapshot, Rejection, UrlScope};
pub use limiter::{HostRateLimiter, LimiterRegistry};
pub use render::{select_strategy, RenderedFetcher, BROWSER_CANDIDATES};
pub use sitemap::{load_sitemap_urls, parse_sitemap, SitemapDocument, MAX_SITEMAP_NESTING};

use crate::config::CrawlJob;
use crate::storage::SqliteStorage;
use crate::HarvestError;
use std::path::Path;
use std::sync::Arc;

/// Runs a complete crawl against the job's SQLite database
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open (or create) the database at `job.database_path`
/// 2. Build the orchestrator and its fetch strategy
/// 3. Crawl until the frontier is exhausted or the budget is spent
///
/// # Arguments
///
/// * `job` - The validated crawl job
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl completed (possibly with per-page errors)
/// * `Err(HarvestError)` - Crawl could not start or finish its bookkeeping
pub async fn crawl(job: CrawlJob) -> Result<CrawlReport, HarvestError> {
    let storage = Arc::new(SqliteStorage::new(Path::new(&job.database_path))?);
    Orchestrator::new(job, storage)?.run().await
}
