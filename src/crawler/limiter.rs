//! Per-host rate limiting
//!
//! One governor direct limiter per host, created lazily. Creation goes
//! through `DashMap::entry`, which holds the shard lock, so two workers that
//! discover the same host at once still end up sharing one limiter.

use dashmap::DashMap;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub type HostRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Registry of per-host limiters for one crawl
pub struct LimiterRegistry {
    quota: Quota,
    limiters: DashMap<String, Arc<HostRateLimiter>>,
}

impl LimiterRegistry {
    /// Creates a registry whose limiters allow `per_host_rate` requests per second
    ///
    /// Bursts are not allowed: consecutive requests to one host are spaced by
    /// at least `1 / per_host_rate` seconds.
    pub fn new(per_host_rate: f64) -> Self {
        let quota = if per_host_rate.is_finite() && per_host_rate > 0.0 {
            Quota::with_period(Duration::from_secs_f64(1.0 / per_host_rate))
        } else {
            None
        }
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX));

        Self {
            quota,
            limiters: DashMap::new(),
        }
    }

    /// Returns the limiter for a host, creating it on first use
    pub fn limiter_for(&self, host: &str) -> Arc<HostRateLimiter> {
        self.limiters
            .entry(host.to_lowercase())
            .or_insert_with(|| {
                debug!("Creating rate limiter for {}", host);
                Arc::new(RateLimiter::direct(self.quota))
            })
            .clone()
    }

    /// Waits until a request to `host` may start
    pub async fn acquire(&self, host: &str) {
        let limiter = self.limiter_for(host);
        limiter.until_ready().await;
    }

    /// Number of hosts seen so far
    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}
