//! URL handling module for Sumi-Harvest
//!
//! This module provides URL normalization and resolution, origin and
//! registrable-domain helpers, and the domain whitelist check.

mod domain;
mod matcher;
mod normalize;

pub use domain::{extract_domain, origin_of, registrable_domain};
pub use matcher::{domain_allowed, is_within_domain};
pub use normalize::{normalize_url, resolve_url};
