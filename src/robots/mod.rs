//! Robots.txt handling module
//!
//! [`RobotsPolicy`] wraps one parsed robots.txt; [`RobotsCache`] fetches and
//! memoizes a policy per origin. Any failure to obtain robots.txt yields a
//! permissive policy.

mod cache;
mod parser;

pub use cache::{RobotsCache, ROBOTS_TIMEOUT};
pub use parser::RobotsPolicy;
