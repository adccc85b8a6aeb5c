//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase`: lifecycle of one crawl (seeding, running, draining, done)
//! - `PhaseTracker`: the shared, forward-only holder of the current phase

mod phase;

pub use phase::{CrawlPhase, PhaseTracker};
