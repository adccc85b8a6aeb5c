//! Crawler coordinator - main crawl orchestration logic
//!
//! One [`Orchestrator`] drives one crawl through its phases:
//! - Seeding: the run is registered, stored URLs are loaded on resume, seeds
//!   and (optionally) sitemap URLs are queued
//! - Running: a fixed pool of workers pulls from the shared frontier
//! - Draining: the budget is spent or no work is left; in-flight items finish
//! - Done: the run is closed out in storage and a report is returned
//!
//! Each worker handles one item at a time: robots check, per-host rate
//! limit, fetch with retry, extraction, upsert, then link expansion.

use crate::config::CrawlJob;
use crate::crawler::fetcher::{
    build_http_client, fetch_with_retry, ContentKind, FetchResponse, FetchStrategy, RetryPolicy,
};
use crate::crawler::frontier::{Dispatched, Frontier, FrontierSnapshot, Rejection, UrlScope};
use crate::crawler::limiter::LimiterRegistry;
use crate::crawler::render::select_strategy;
use crate::crawler::sitemap::load_sitemap_urls;
use crate::extract::extract;
use crate::robots::RobotsCache;
use crate::state::{CrawlPhase, PhaseTracker};
use crate::storage::{PageRecord, RunStatus, Storage};
use crate::url::{extract_domain, normalize_url, origin_of};
use crate::{ConfigError, HarvestError};
use reqwest::Client;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Counters handed to the progress callback after every finished item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlProgress {
    pub discovered: usize,
    pub seen: usize,
    pub processed: u64,
    pub in_progress: usize,
    pub current_url: String,
}

/// Called after each item completes
pub type ProgressCallback = Arc<dyn Fn(&CrawlProgress) + Send + Sync>;

/// Outcome of a finished crawl
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub run_id: i64,
    /// Records written, including error records
    pub pages_processed: u64,
    pub pages_with_errors: u64,
    /// Items dropped after dequeue (robots.txt)
    pub pages_skipped: u64,
    pub elapsed: Duration,
    pub cancelled: bool,
}

/// Main crawler coordinator structure
pub struct Orchestrator {
    job: Arc<CrawlJob>,
    storage: Arc<dyn Storage>,
    client: Client,
    fetcher: Arc<dyn FetchStrategy>,
    robots: Arc<RobotsCache>,
    limiters: Arc<LimiterRegistry>,
    retry: RetryPolicy,
    progress: Option<ProgressCallback>,
    phase: Arc<PhaseTracker>,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Creates an orchestrator for `job`, writing into `storage`
    ///
    /// The HTTP client, fetch strategy, robots cache and limiter registry are
    /// created here and belong to this crawl only.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(job: CrawlJob, storage: Arc<dyn Storage>) -> Result<Self, HarvestError> {
        let client = build_http_client(&job.user_agent, job.timeout)?;
        let fetcher = select_strategy(job.render_js, client.clone(), &job.user_agent, job.timeout);
        let robots = Arc::new(RobotsCache::new(client.clone(), job.robots_agent.clone()));
        let limiters = Arc::new(LimiterRegistry::new(job.per_host_rate));

        Ok(Self {
            job: Arc::new(job),
            storage,
            client,
            fetcher,
            robots,
            limiters,
            retry: RetryPolicy::default(),
            progress: None,
            phase: Arc::new(PhaseTracker::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// Replaces the fetch strategy chosen at construction
    pub fn with_fetcher(mut self, fetcher: Arc<dyn FetchStrategy>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Token that stops the crawl when cancelled
    ///
    /// Workers stop taking new items; items already being fetched finish and
    /// are persisted. The run is recorded as interrupted.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase.current()
    }

    /// Runs the crawl to completion
    ///
    /// # Errors
    ///
    /// Only configuration problems (no seeds) and storage failures while
    /// registering or closing the run are returned. Per-URL failures end up
    /// in the stored records.
    pub async fn run(self) -> Result<CrawlReport, HarvestError> {
        if self.job.seeds.is_empty() {
            return Err(ConfigError::NoSeeds.into());
        }

        let started = Instant::now();
        let run_id = self.storage.create_run(&self.job.config_hash)?;
        tracing::info!(
            "Starting crawl run {} with {} seed(s), fetching via {}",
            run_id,
            self.job.seeds.len(),
            self.fetcher.name()
        );

        let frontier = Arc::new(Frontier::new(
            UrlScope::from_job(&self.job),
            self.job.max_pages,
            self.cancel.clone(),
        ));
        if let Err(e) = self.seed(&frontier).await {
            if let Err(mark) = self.storage.finish_run(run_id, RunStatus::Failed, 0, 0) {
                tracing::error!("Cannot mark run {} as failed: {}", run_id, mark);
            }
            return Err(e);
        }

        self.phase.advance(CrawlPhase::Running)?;

        let worker = Arc::new(Worker {
            job: Arc::clone(&self.job),
            storage: Arc::clone(&self.storage),
            fetcher: Arc::clone(&self.fetcher),
            robots: Arc::clone(&self.robots),
            limiters: Arc::clone(&self.limiters),
            retry: self.retry,
            progress: self.progress.clone(),
            phase: Arc::clone(&self.phase),
            cancel: self.cancel.clone(),
            frontier: Arc::clone(&frontier),
            processed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            started,
        });

        let mut workers = JoinSet::new();
        for id in 0..self.job.concurrency {
            let worker = Arc::clone(&worker);
            workers.spawn(async move { worker.run(id).await });
        }
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Worker task failed: {}", e);
            }
        }

        // Every worker has exited, so nothing is in flight any more
        self.phase.advance(CrawlPhase::Draining)?;
        frontier.close();

        let cancelled = self.cancel.is_cancelled();
        let report = CrawlReport {
            run_id,
            pages_processed: worker.processed.load(Ordering::SeqCst),
            pages_with_errors: worker.errors.load(Ordering::SeqCst),
            pages_skipped: worker.skipped.load(Ordering::SeqCst),
            elapsed: started.elapsed(),
            cancelled,
        };

        let status = if cancelled {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };
        self.storage.finish_run(
            run_id,
            status,
            report.pages_processed,
            report.pages_with_errors,
        )?;
        self.storage.close()?;
        self.phase.advance(CrawlPhase::Done)?;

        tracing::info!(
            "Crawl {}: {} pages processed ({} with errors) in {:?}",
            status.to_db_string(),
            report.pages_processed,
            report.pages_with_errors,
            report.elapsed
        );

        Ok(report)
    }

    async fn seed(&self, frontier: &Frontier) -> Result<(), HarvestError> {
        if self.job.resume {
            let stored = self.storage.list_seen_urls()?;
            if !stored.is_empty() {
                tracing::info!("Resuming: {} URLs already stored", stored.len());
            }
            for url in &stored {
                frontier.mark_seen(url);
            }
        }

        for seed in &self.job.seeds {
            match frontier.enqueue(seed, 0) {
                Ok(()) => {}
                Err(Rejection::AlreadySeen) if self.job.resume => {
                    self.requeue_stored_links(frontier, seed)?;
                }
                Err(rejection) => tracing::debug!("Seed {} not queued: {}", seed, rejection),
            }
        }

        if self.job.use_sitemaps {
            self.enqueue_sitemaps(frontier).await;
        }

        let snapshot = frontier.snapshot();
        tracing::info!("Seeded frontier with {} URLs", snapshot.queued);
        Ok(())
    }

    /// Walks stored records outward from an already-fetched seed and queues
    /// the links that were never fetched, keeping their original depth
    fn requeue_stored_links(&self, frontier: &Frontier, seed: &Url) -> Result<(), HarvestError> {
        let mut visited = HashSet::new();
        let mut pending = VecDeque::from([(seed.as_str().to_string(), 0u32)]);
        let mut requeued = 0usize;

        while let Some((url, depth)) = pending.pop_front() {
            if !visited.insert(url.clone()) || depth >= self.job.max_depth {
                continue;
            }
            let Some(record) = self.storage.get_page(&url)? else {
                continue;
            };

            for link in &record.links {
                let Ok(link) = normalize_url(link) else {
                    continue;
                };
                match frontier.enqueue(&link, depth + 1) {
                    Ok(()) => requeued += 1,
                    Err(Rejection::AlreadySeen) => {
                        pending.push_back((link.as_str().to_string(), depth + 1))
                    }
                    Err(_) => {}
                }
            }
        }

        tracing::debug!("Requeued {} stored links below {}", requeued, seed);
        Ok(())
    }

    async fn enqueue_sitemaps(&self, frontier: &Frontier) {
        let origins: BTreeSet<String> = self.job.seeds.iter().map(origin_of).collect();

        for origin in origins {
            let Ok(base) = Url::parse(&origin) else {
                continue;
            };
            let sitemaps = self.robots.sitemaps_for(&origin).await;
            if sitemaps.is_empty() {
                continue;
            }

            let urls = load_sitemap_urls(&self.client, &sitemaps, &base, self.job.max_pages).await;
            let mut added = 0usize;
            for url in &urls {
                if frontier.enqueue(url, 0).is_ok() {
                    added += 1;
                }
            }
            tracing::info!("Queued {} of {} sitemap URLs from {}", added, urls.len(), origin);
        }
    }
}

/// State shared by every worker of one crawl
struct Worker {
    job: Arc<CrawlJob>,
    storage: Arc<dyn Storage>,
    fetcher: Arc<dyn FetchStrategy>,
    robots: Arc<RobotsCache>,
    limiters: Arc<LimiterRegistry>,
    retry: RetryPolicy,
    progress: Option<ProgressCallback>,
    phase: Arc<PhaseTracker>,
    cancel: CancellationToken,
    frontier: Arc<Frontier>,
    processed: AtomicU64,
    errors: AtomicU64,
    skipped: AtomicU64,
    started: Instant,
}

impl Worker {
    async fn run(&self, id: usize) {
        tracing::debug!("Worker {} started", id);

        // A spent budget alone is not draining: a refund can reopen dispatch
        while let Some(dispatched) = self.frontier.dequeue().await {
            self.process(dispatched).await;
        }
        self.enter_draining();

        tracing::debug!("Worker {} finished", id);
    }

    fn enter_draining(&self) {
        if let Err(e) = self.phase.advance(CrawlPhase::Draining) {
            tracing::debug!("Not entering draining: {}", e);
        }
    }

    async fn process(&self, dispatched: Dispatched<'_>) {
        let url = dispatched.url().clone();
        let depth = dispatched.depth();

        if let Err(rejection) = self.robots_check(&url).await {
            tracing::debug!("{} not fetched: {}", url, rejection);
            self.skipped.fetch_add(1, Ordering::SeqCst);
            dispatched.refund();
            self.report(self.processed.load(Ordering::SeqCst), &url);
            return;
        }

        let host = extract_domain(&url).unwrap_or_default();
        tokio::select! {
            _ = self.limiters.acquire(&host) => {}
            _ = self.cancel.cancelled() => {
                dispatched.refund();
                self.report(self.processed.load(Ordering::SeqCst), &url);
                return;
            }
        }

        let (record, links) = match fetch_with_retry(self.fetcher.as_ref(), &url, &self.retry).await {
            Ok(response) => {
                let final_url = normalize_url(response.final_url.as_str())
                    .unwrap_or_else(|_| response.final_url.clone());
                if final_url != url {
                    self.frontier.mark_seen(final_url.as_str());
                }
                build_record(&url, &final_url, response, self.job.store_html)
            }
            Err(e) => (PageRecord::failed(url.as_str(), e.to_string()), Vec::new()),
        };

        if let Err(e) = self.storage.upsert_page(&record) {
            tracing::error!("Failed to store {}: {}", url, e);
        }
        let processed = self.processed.fetch_add(1, Ordering::SeqCst) + 1;
        if record.has_error() {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        if depth < self.job.max_depth && !self.frontier.budget_exhausted() {
            let accepted = links
                .iter()
                .filter(|link| self.frontier.enqueue(link, depth + 1).is_ok())
                .count();
            tracing::debug!("{}: {} of {} links queued", url, accepted, links.len());
        }

        // Finish the item before reporting so in-progress excludes it
        drop(dispatched);
        let snapshot = self.report(processed, &url);
        if processed % 10 == 0 {
            self.log_progress(processed, &snapshot);
        }
    }

    async fn robots_check(&self, url: &Url) -> Result<(), Rejection> {
        if self.job.respect_robots && !self.robots.is_allowed(&origin_of(url), url).await {
            return Err(Rejection::RobotsDisallowed);
        }
        Ok(())
    }

    /// Hands the counters to the progress callback once an item is done with
    fn report(&self, processed: u64, current: &Url) -> FrontierSnapshot {
        let snapshot = self.frontier.snapshot();

        if let Some(callback) = &self.progress {
            callback(&CrawlProgress {
                discovered: snapshot.discovered,
                seen: snapshot.seen,
                processed,
                in_progress: snapshot.in_flight,
                current_url: current.to_string(),
            });
        }

        snapshot
    }

    fn log_progress(&self, processed: u64, snapshot: &FrontierSnapshot) {
        let rate = processed as f64 / self.started.elapsed().as_secs_f64().max(f64::EPSILON);
        tracing::info!(
            "Progress: {} pages processed, {} queued, {} in flight, {:.2} pages/sec",
            processed,
            snapshot.queued,
            snapshot.in_flight,
            rate
        );
    }
}

/// Turns a response into a record plus the links to follow
///
/// Non-2xx responses are recorded with their status and an `http_<status>`
/// error, and nothing is extracted from them.
pub(crate) fn build_record(
    url: &Url,
    final_url: &Url,
    response: FetchResponse,
    store_html: bool,
) -> (PageRecord, Vec<Url>) {
    let mut record = PageRecord::new(url.as_str()).with_final_url(final_url.as_str());
    record.status = Some(response.status);
    record.content_type = response.content_type().map(str::to_string);

    if !response.is_success() {
        record.error = Some(format!("http_{}", response.status));
        record.headers = response.headers;
        return (record, Vec::new());
    }

    let kind = response.kind();
    let extraction = extract(kind, &response.body, final_url);

    record.title = extraction.title;
    record.meta_description = extraction.meta_description;
    record.headings = extraction.headings;
    record.text = extraction.text;
    record.tables = extraction.tables;
    record.links = extraction.links.iter().map(Url::to_string).collect();
    if store_html && kind == ContentKind::Html {
        record.html = Some(String::from_utf8_lossy(&response.body).into_owned());
    }
    record.headers = response.headers;

    (record, extraction.links)
}

/// Fetches and extracts a single URL without crawling or storing anything
///
/// # Errors
///
/// Returns an error for an unusable URL or when every fetch attempt failed at
/// the transport level. HTTP error statuses come back as a record.
pub async fn fetch_and_extract(job: &CrawlJob, url: &str) -> Result<PageRecord, HarvestError> {
    let url = normalize_url(url)?;
    let client = build_http_client(&job.user_agent, job.timeout)?;
    let fetcher = select_strategy(job.render_js, client, &job.user_agent, job.timeout);

    let response = fetch_with_retry(fetcher.as_ref(), &url, &RetryPolicy::default()).await?;
    let final_url =
        normalize_url(response.final_url.as_str()).unwrap_or_else(|_| response.final_url.clone());

    Ok(build_record(&url, &final_url, response, job.store_html).0)
}
