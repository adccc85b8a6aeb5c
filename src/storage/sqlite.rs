//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.
//! The connection lives behind a mutex; every upsert is one statement, so a
//! record is either fully written or not at all.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{PageRecord, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const PAGE_COLUMNS: &str = "url, id, final_url, status, content_type, title, meta_description, \
     headings, text, tables, links, html, headers, fetched_at, error";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`, creating parent directories
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database (tests and dry runs)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    /// Record counts per HTTP status, `None` for fetches without a response
    pub fn status_breakdown(&self) -> StorageResult<Vec<(Option<u16>, u64)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM pages GROUP BY status ORDER BY COUNT(*) DESC, status",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, Option<u16>>(0)?, row.get::<_, i64>(1)? as u64))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Record counts per content type, `None` when the header was absent
    pub fn content_type_breakdown(&self) -> StorageResult<Vec<(Option<String>, u64)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT content_type, COUNT(*) FROM pages GROUP BY content_type ORDER BY COUNT(*) DESC, content_type",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, Option<String>>(0)?, row.get::<_, i64>(1)? as u64))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        url: row.get(0)?,
        id: row.get(1)?,
        final_url: row.get(2)?,
        status: row.get(3)?,
        content_type: row.get(4)?,
        title: row.get(5)?,
        meta_description: row.get(6)?,
        headings: json_column(row, 7)?,
        text: row.get(8)?,
        tables: json_column(row, 9)?,
        links: json_column(row, 10)?,
        html: row.get(11)?,
        headers: json_column(row, 12)?,
        fetched_at: row.get(13)?,
        error: row.get(14)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
        pages_processed: row.get::<_, i64>(5)? as u64,
        pages_with_errors: row.get::<_, i64>(6)? as u64,
    })
}

impl Storage for SqliteStorage {
    // ===== Pages =====

    fn upsert_page(&self, record: &PageRecord) -> StorageResult<()> {
        // Serialize before taking the lock
        let headings = serde_json::to_string(&record.headings)?;
        let tables = serde_json::to_string(&record.tables)?;
        let links = serde_json::to_string(&record.links)?;
        let headers = serde_json::to_string(&record.headers)?;

        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO pages ({PAGE_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                 ON CONFLICT(url) DO UPDATE SET
                    id = excluded.id,
                    final_url = excluded.final_url,
                    status = excluded.status,
                    content_type = excluded.content_type,
                    title = excluded.title,
                    meta_description = excluded.meta_description,
                    headings = excluded.headings,
                    text = excluded.text,
                    tables = excluded.tables,
                    links = excluded.links,
                    html = excluded.html,
                    headers = excluded.headers,
                    fetched_at = excluded.fetched_at,
                    error = excluded.error"
            ),
            params![
                record.url,
                record.id,
                record.final_url,
                record.status,
                record.content_type,
                record.title,
                record.meta_description,
                headings,
                record.text,
                tables,
                links,
                record.html,
                headers,
                record.fetched_at,
                record.error,
            ],
        )?;
        Ok(())
    }

    fn list_seen_urls(&self) -> StorageResult<HashSet<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT url, final_url FROM pages")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut seen = HashSet::new();
        for row in rows {
            let (url, final_url) = row?;
            seen.insert(url);
            seen.insert(final_url);
        }
        Ok(seen)
    }

    fn list_pages(&self) -> StorageResult<Vec<PageRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages ORDER BY fetched_at DESC, url ASC"
        ))?;
        let pages = stmt
            .query_map([], page_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pages)
    }

    fn get_page(&self, url: &str) -> StorageResult<Option<PageRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {PAGE_COLUMNS} FROM pages WHERE url = ?1"))?;
        let page = stmt.query_row(params![url], page_from_row).optional()?;
        Ok(page)
    }

    fn count_pages(&self) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_error_pages(&self) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE error IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Run Management =====

    fn create_run(&self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        pages_processed: u64,
        pages_with_errors: u64,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn()?;
        conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, pages_processed = ?3, pages_with_errors = ?4
             WHERE id = ?5",
            params![
                status.to_db_string(),
                now,
                pages_processed as i64,
                pages_with_errors as i64,
                run_id
            ],
        )?;
        Ok(())
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, started_at, finished_at, config_hash, status, pages_processed, pages_with_errors
             FROM runs ORDER BY id DESC LIMIT 1",
        )?;
        let run = stmt.query_row([], run_from_row).optional()?;
        Ok(run)
    }

    fn close(&self) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        Ok(())
    }
}
