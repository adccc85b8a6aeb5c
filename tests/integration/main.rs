//! End-to-end tests against wiremock servers and on-disk databases

mod common;
mod crawl_tests;
mod resume_tests;
