//! Storage traits and error types
//!
//! The crawl only ever talks to a [`Storage`]; workers share one instance
//! behind an `Arc`, so every method takes `&self` and implementations do their
//! own locking.

use crate::storage::{PageRecord, RunRecord, RunStatus};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage lock poisoned")]
    Poisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable sink for crawl results
///
/// Implementations must make each [`upsert_page`](Storage::upsert_page) a
/// single atomic write: concurrent callers may interleave between calls but
/// never observe a half-written record.
pub trait Storage: Send + Sync {
    // ===== Pages =====

    /// Inserts a record, or overwrites every field of the record with the same URL
    fn upsert_page(&self, record: &PageRecord) -> StorageResult<()>;

    /// Every stored `url` and `final_url`, used to pre-populate the seen set on resume
    fn list_seen_urls(&self) -> StorageResult<HashSet<String>>;

    /// All records, most recently fetched first
    fn list_pages(&self) -> StorageResult<Vec<PageRecord>>;

    /// Looks up a record by its (normalized) request URL
    fn get_page(&self, url: &str) -> StorageResult<Option<PageRecord>>;

    fn count_pages(&self) -> StorageResult<u64>;

    /// Records whose `error` field is set
    fn count_error_pages(&self) -> StorageResult<u64>;

    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration the run was started with
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&self, config_hash: &str) -> StorageResult<i64>;

    /// Marks a run finished with its final status and counts
    fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        pages_processed: u64,
        pages_with_errors: u64,
    ) -> StorageResult<()>;

    /// Gets the most recently started run, if any
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Flushes pending writes; the sink stays usable afterwards
    fn close(&self) -> StorageResult<()>;
}
