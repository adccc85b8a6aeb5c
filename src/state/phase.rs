//! Crawl phase definitions
//!
//! A crawl moves strictly forward: `Seeding -> Running -> Draining -> Done`.

use crate::HarvestError;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tracing::info;

/// Lifecycle phase of one crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Seeds (and sitemap URLs) are being normalized and enqueued
    Seeding,

    /// Workers are dequeuing and processing items
    Running,

    /// Budget reached or frontier exhausted; in-flight items finish, nothing new starts
    Draining,

    /// Terminal; storage closed and report produced
    Done,
}

impl CrawlPhase {
    /// Returns true if `next` is the phase directly after this one
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        matches!(
            (self, next),
            (Self::Seeding, Self::Running)
                | (Self::Running, Self::Draining)
                | (Self::Draining, Self::Done)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seeding => "seeding",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shared holder of the current phase
///
/// Workers race to report draining; only the first report moves the phase.
#[derive(Debug)]
pub struct PhaseTracker {
    phase: Mutex<CrawlPhase>,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            phase: Mutex::new(CrawlPhase::Seeding),
        }
    }

    pub fn current(&self) -> CrawlPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves to `next`
    ///
    /// Returns `Ok(false)` when already in `next`, and an error for any
    /// transition that skips or reverses a phase.
    pub fn advance(&self, next: CrawlPhase) -> Result<bool, HarvestError> {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);

        if *phase == next {
            return Ok(false);
        }

        if !phase.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: *phase,
                to: next,
            });
        }

        info!("Crawl phase: {} -> {}", phase, next);
        *phase = next;
        Ok(true)
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}
