//! Work queue with deduplication and crawl bounds
//!
//! The queue and the seen set live behind one mutex, so check-seen-then-add
//! is a single critical section. `dequeue` parks on a `Notify` when there is
//! nothing to hand out but other items are still in flight, since those may
//! produce new links.

use crate::config::CrawlJob;
use crate::url::domain_allowed;
use regex::Regex;
use std::collections::{HashSet, VecDeque};
use std::pin::pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use url::Url;

/// A pending unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierItem {
    pub url: Url,
    pub depth: u32,
}

/// Why a URL was not crawled; a policy outcome, never an error record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("already seen")]
    AlreadySeen,

    #[error("outside the allowed domains")]
    OutOfScope,

    #[error("matches an exclude pattern")]
    Excluded,

    #[error("matches no include pattern")]
    NotIncluded,

    #[error("deeper than max depth")]
    TooDeep,

    #[error("disallowed by robots.txt")]
    RobotsDisallowed,
}

/// Domain whitelist, URL patterns and depth bound
#[derive(Debug, Clone)]
pub struct UrlScope {
    allowed_domains: Vec<String>,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    max_depth: u32,
}

impl UrlScope {
    pub fn new(
        allowed_domains: Vec<String>,
        include: Vec<Regex>,
        exclude: Vec<Regex>,
        max_depth: u32,
    ) -> Self {
        Self {
            allowed_domains,
            include,
            exclude,
            max_depth,
        }
    }

    pub fn from_job(job: &CrawlJob) -> Self {
        Self::new(
            job.allowed_domains.clone(),
            job.include_patterns.clone(),
            job.exclude_patterns.clone(),
            job.max_depth,
        )
    }

    /// Checks a normalized URL at a given depth
    pub fn check(&self, url: &Url, depth: u32) -> Result<(), Rejection> {
        let host = url.host_str().ok_or(Rejection::OutOfScope)?;
        if !domain_allowed(host, &self.allowed_domains) {
            return Err(Rejection::OutOfScope);
        }

        let candidate = url.as_str();
        if self.exclude.iter().any(|re| re.is_match(candidate)) {
            return Err(Rejection::Excluded);
        }
        if !self.include.is_empty() && !self.include.iter().any(|re| re.is_match(candidate)) {
            return Err(Rejection::NotIncluded);
        }

        if depth > self.max_depth {
            return Err(Rejection::TooDeep);
        }

        Ok(())
    }
}

/// Point-in-time counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontierSnapshot {
    /// URLs accepted into the queue during this crawl
    pub discovered: usize,
    /// Size of the seen set, including URLs loaded for resume
    pub seen: usize,
    pub queued: usize,
    pub in_flight: usize,
    /// Items handed to workers and counted against the page budget
    pub dispatched: usize,
}

#[derive(Debug, Default)]
struct FrontierState {
    queue: VecDeque<FrontierItem>,
    seen: HashSet<String>,
    discovered: usize,
    in_flight: usize,
    dispatched: usize,
    closed: bool,
}

/// Shared frontier for one crawl
pub struct Frontier {
    scope: UrlScope,
    max_pages: usize,
    state: Mutex<FrontierState>,
    changed: Notify,
    cancel: CancellationToken,
}

impl Frontier {
    pub fn new(scope: UrlScope, max_pages: usize, cancel: CancellationToken) -> Self {
        Self {
            scope,
            max_pages,
            state: Mutex::new(FrontierState::default()),
            changed: Notify::new(),
            cancel,
        }
    }

    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn scope(&self) -> &UrlScope {
        &self.scope
    }

    /// Accepts a normalized URL unless it is seen, out of scope or filtered out
    pub fn enqueue(&self, url: &Url, depth: u32) -> Result<(), Rejection> {
        self.scope.check(url, depth)?;

        {
            let mut state = self.lock();
            if !state.seen.insert(url.as_str().to_string()) {
                return Err(Rejection::AlreadySeen);
            }
            state.discovered += 1;
            state.queue.push_back(FrontierItem {
                url: url.clone(),
                depth,
            });
        }

        self.changed.notify_waiters();
        Ok(())
    }

    /// Records a URL as seen without queueing it
    ///
    /// Used for URLs already stored by an earlier crawl and for redirect
    /// targets. Returns false if it was already seen.
    pub fn mark_seen(&self, url: &str) -> bool {
        self.lock().seen.insert(url.to_string())
    }

    pub fn is_seen(&self, url: &str) -> bool {
        self.lock().seen.contains(url)
    }

    /// Takes the next item, waiting while the queue is empty but work is in flight
    ///
    /// Returns `None` once the crawl is over: cancelled, closed, the page
    /// budget is spent with nothing in flight, or the queue is empty with
    /// nothing in flight. While the budget is spent but items are still in
    /// flight no new item is handed out; a refunded slot may reopen it.
    pub async fn dequeue(&self) -> Option<Dispatched<'_>> {
        loop {
            let mut notified = pin!(self.changed.notified());
            notified.as_mut().enable();

            {
                let mut state = self.lock();

                if state.closed || self.cancel.is_cancelled() {
                    return None;
                }

                let budget_spent = state.dispatched >= self.max_pages;
                if !budget_spent {
                    if let Some(item) = state.queue.pop_front() {
                        state.in_flight += 1;
                        state.dispatched += 1;
                        return Some(Dispatched {
                            frontier: self,
                            item,
                            counted: true,
                        });
                    }
                }

                if state.in_flight == 0 {
                    state.closed = true;
                    drop(state);
                    self.changed.notify_waiters();
                    return None;
                }
            }

            tokio::select! {
                _ = notified => {}
                _ = self.cancel.cancelled() => return None,
            }
        }
    }

    fn finish(&self, counted: bool) {
        {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            if !counted {
                state.dispatched = state.dispatched.saturating_sub(1);
            }
        }
        self.changed.notify_waiters();
    }

    /// True once no further item will be dispatched under the page budget
    pub fn budget_exhausted(&self) -> bool {
        self.lock().dispatched >= self.max_pages
    }

    /// Stops all further dequeues
    pub fn close(&self) {
        self.lock().closed = true;
        self.changed.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn snapshot(&self) -> FrontierSnapshot {
        let state = self.lock();
        FrontierSnapshot {
            discovered: state.discovered,
            seen: state.seen.len(),
            queued: state.queue.len(),
            in_flight: state.in_flight,
            dispatched: state.dispatched,
        }
    }
}

/// An item handed to a worker
///
/// Dropping it marks the item finished. Call [`Dispatched::refund`] when the
/// item was dropped by policy after dequeue so it does not use up budget.
pub struct Dispatched<'a> {
    frontier: &'a Frontier,
    item: FrontierItem,
    counted: bool,
}

impl Dispatched<'_> {
    pub fn item(&self) -> &FrontierItem {
        &self.item
    }

    pub fn url(&self) -> &Url {
        &self.item.url
    }

    pub fn depth(&self) -> u32 {
        self.item.depth
    }

    /// Returns the budget slot taken by this item
    pub fn refund(mut self) {
        self.counted = false;
    }
}

impl Drop for Dispatched<'_> {
    fn drop(&mut self) {
        self.frontier.finish(self.counted);
    }
}
