//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Tip-Harvest database.

/// Schema version stored in `PRAGMA user_version`
pub const SCHEMA_VERSION: u32 = 1;

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    start_page INTEGER NOT NULL,
    timespan TEXT NOT NULL,
    status TEXT NOT NULL,
    pages INTEGER NOT NULL DEFAULT 0,
    inserted INTEGER NOT NULL DEFAULT 0
);

-- Resolved tips, keyed by the tipping comment's fullname
CREATE TABLE IF NOT EXISTS tips (
    id TEXT PRIMARY KEY NOT NULL,
    amount_native REAL NOT NULL CHECK (amount_native >= 0),
    amount_reference REAL NOT NULL CHECK (amount_reference >= 0),
    created_utc INTEGER NOT NULL CHECK (created_utc > 0),
    sender TEXT NOT NULL,
    receiver TEXT NOT NULL,
    subreddit TEXT NOT NULL,
    harvested_at TEXT NOT NULL,
    run_id INTEGER REFERENCES runs(id)
);

CREATE INDEX IF NOT EXISTS idx_tips_subreddit ON tips(subreddit);
CREATE INDEX IF NOT EXISTS idx_tips_created ON tips(created_utc);
"#;

/// Initializes the database schema
///
/// Safe to run against an existing database; every statement is idempotent.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

/// Reads the schema version recorded in the database
pub fn get_schema_version(conn: &rusqlite::Connection) -> Result<u32, rusqlite::Error> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}
