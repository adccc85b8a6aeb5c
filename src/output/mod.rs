//! Output module for crawl reports
//!
//! This module handles:
//! - Summarizing a finished crawl for the terminal
//! - Loading and printing statistics from an existing database

pub mod stats;

pub use stats::{load_statistics, print_statistics, render_statistics, CrawlStatistics};

use crate::crawler::CrawlReport;

/// One-paragraph summary of a finished crawl
pub fn render_report(report: &CrawlReport) -> String {
    let rate = if report.elapsed.as_secs_f64() > 0.0 {
        report.pages_processed as f64 / report.elapsed.as_secs_f64()
    } else {
        0.0
    };

    let mut text = format!(
        "Run #{} {}: {} pages processed, {} with errors, {} skipped by robots.txt in {:.1}s ({:.2} pages/sec)",
        report.run_id,
        if report.cancelled { "interrupted" } else { "completed" },
        report.pages_processed,
        report.pages_with_errors,
        report.pages_skipped,
        report.elapsed.as_secs_f64(),
        rate
    );
    if report.cancelled {
        text.push_str("\nRun again to resume where it stopped.");
    }
    text
}
