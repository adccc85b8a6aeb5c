//! Statistics generation from the crawl database
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::storage::{RunRecord, SqliteStorage, Storage, StorageResult};
use std::fmt::Write;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Total number of stored page records
    pub total_pages: u64,

    /// Records with a non-null error
    pub pages_with_errors: u64,

    /// Record counts by HTTP status; `None` means no response was received
    pub by_status: Vec<(Option<u16>, u64)>,

    /// Record counts by content type
    pub by_content_type: Vec<(Option<String>, u64)>,

    /// The most recent crawl run, if any
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The database to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(storage: &SqliteStorage) -> StorageResult<CrawlStatistics> {
    Ok(CrawlStatistics {
        total_pages: storage.count_pages()?,
        pages_with_errors: storage.count_error_pages()?,
        by_status: storage.status_breakdown()?,
        by_content_type: storage.content_type_breakdown()?,
        latest_run: storage.get_latest_run()?,
    })
}

fn percentage(count: u64, total: u64) -> f64 {
    if total > 0 {
        (count as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Formats statistics as the text shown by `--stats`
pub fn render_statistics(stats: &CrawlStatistics) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "=== Crawl Statistics ===\n");

    if let Some(run) = &stats.latest_run {
        let _ = writeln!(out, "Latest run:");
        let _ = writeln!(out, "  Run #{} ({})", run.id, run.status.to_db_string());
        let _ = writeln!(out, "  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            let _ = writeln!(out, "  Finished: {}", finished);
        }
        let _ = writeln!(
            out,
            "  Processed: {} ({} with errors)\n",
            run.pages_processed, run.pages_with_errors
        );
    }

    let _ = writeln!(out, "Overview:");
    let _ = writeln!(out, "  Total pages stored: {}", stats.total_pages);
    let _ = writeln!(out, "  Pages with errors: {}\n", stats.pages_with_errors);

    let _ = writeln!(out, "Pages by HTTP Status:");
    for (status, count) in &stats.by_status {
        let label = status.map_or_else(|| "no response".to_string(), |s| s.to_string());
        let _ = writeln!(
            out,
            "  {}: {} ({:.1}%)",
            label,
            count,
            percentage(*count, stats.total_pages)
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Pages by Content Type:");
    for (content_type, count) in &stats.by_content_type {
        let _ = writeln!(
            out,
            "  {}: {}",
            content_type.as_deref().unwrap_or("unknown"),
            count
        );
    }
    let _ = writeln!(out);

    let ok = stats.total_pages.saturating_sub(stats.pages_with_errors);
    let _ = writeln!(
        out,
        "Success Rate: {:.1}% ({} / {} pages without errors)",
        percentage(ok, stats.total_pages),
        ok,
        stats.total_pages
    );

    out
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    print!("{}", render_statistics(stats));
}
