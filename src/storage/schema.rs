//! Database schema definitions
//!
//! Pages are keyed by their normalized URL so a repeated write is an upsert.
//! Structured fields (headings, tables, links, headers) are stored as JSON text.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    pages_processed INTEGER NOT NULL DEFAULT 0,
    pages_with_errors INTEGER NOT NULL DEFAULT 0
);

-- One row per fetched URL
CREATE TABLE IF NOT EXISTS pages (
    url TEXT PRIMARY KEY,
    id TEXT NOT NULL,
    final_url TEXT NOT NULL,
    status INTEGER,
    content_type TEXT,
    title TEXT NOT NULL DEFAULT '',
    meta_description TEXT,
    headings TEXT NOT NULL DEFAULT '{}',
    text TEXT NOT NULL DEFAULT '',
    tables TEXT NOT NULL DEFAULT '[]',
    links TEXT NOT NULL DEFAULT '[]',
    html TEXT,
    headers TEXT NOT NULL DEFAULT '{}',
    fetched_at INTEGER NOT NULL,
    error TEXT
);

CREATE INDEX IF NOT EXISTS idx_pages_final_url ON pages(final_url);
CREATE INDEX IF NOT EXISTS idx_pages_fetched_at ON pages(fetched_at);
"#;

/// Creates all tables and indexes if they do not exist yet
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.pragma_update(None, "user_version", get_schema_version())?;
    Ok(())
}

/// Gets the current schema version
///
/// This can be used for future migrations if the schema changes.
pub fn get_schema_version() -> u32 {
    1
}
