//! Storage module for persisting crawl results
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Page record upserts keyed by normalized URL
//! - Run tracking and resumption support

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::extract::ExtractedTable;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Stable identifier of a page: the first 16 hex chars of SHA-256 of its final URL
pub fn page_id(final_url: &str) -> String {
    let digest = Sha256::digest(final_url.as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(16);
    id
}

/// Result of one fetch attempt, as persisted and exported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    pub id: String,
    /// Normalized request URL; the upsert key
    pub url: String,
    /// URL after redirects
    pub final_url: String,
    /// `None` when no response was received
    pub status: Option<u16>,
    pub content_type: Option<String>,
    pub title: String,
    pub meta_description: Option<String>,
    pub headings: BTreeMap<String, Vec<String>>,
    #[serde(rename = "textExcerptOrFull")]
    pub text: String,
    pub tables: Vec<ExtractedTable>,
    pub links: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    pub headers: BTreeMap<String, String>,
    #[serde(rename = "fetchedAtEpochSeconds")]
    pub fetched_at: i64,
    pub error: Option<String>,
}

impl PageRecord {
    /// An empty record for `url`, fetched now, with no redirect
    pub fn new(url: &str) -> Self {
        Self {
            id: page_id(url),
            url: url.to_string(),
            final_url: url.to_string(),
            status: None,
            content_type: None,
            title: String::new(),
            meta_description: None,
            headings: BTreeMap::new(),
            text: String::new(),
            tables: Vec::new(),
            links: Vec::new(),
            html: None,
            headers: BTreeMap::new(),
            fetched_at: Utc::now().timestamp(),
            error: None,
        }
    }

    /// A record for a fetch that never produced a response
    pub fn failed(url: &str, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(url)
        }
    }

    /// Points the record at the post-redirect URL and re-derives the id
    pub fn with_final_url(mut self, final_url: &str) -> Self {
        self.final_url = final_url.to_string();
        self.id = page_id(final_url);
        self
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub pages_processed: u64,
    pub pages_with_errors: u64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
