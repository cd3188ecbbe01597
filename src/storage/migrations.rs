//! Database schema migrations for the search history tables
//!
//! Migration Strategy:
//! - Each migration is a one-way operation
//! - Version is tracked in the metadata table
//! - Migrations run inside one transaction so a failure leaves the old schema

use rusqlite::Connection;

/// Current schema version
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

/// Get current schema version from database (0 for a fresh database)
pub fn get_schema_version(conn: &Connection) -> u32 {
    conn.query_row(
        "SELECT value FROM metadata WHERE key = 'schema_version'",
        [],
        |row| row.get::<_, String>(0),
    )
    .ok()
    .and_then(|v| v.parse().ok())
    .unwrap_or(0)
}

fn set_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [version.to_string()],
    )?;
    Ok(())
}

/// Run all pending migrations. Returns true if anything was applied.
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<bool> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS metadata (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    let current_version = get_schema_version(conn);
    if current_version >= CURRENT_SCHEMA_VERSION {
        log::debug!("[Migration] Schema is current (v{})", current_version);
        return Ok(false);
    }

    log::info!(
        "[Migration] Upgrading schema v{} -> v{}",
        current_version,
        CURRENT_SCHEMA_VERSION
    );

    let tx = conn.unchecked_transaction()?;
    if current_version < 1 {
        migrate_v0_to_v1(&tx)?;
    }
    if current_version < 2 {
        migrate_v1_to_v2(&tx)?;
    }
    if current_version < 3 {
        migrate_v2_to_v3(&tx)?;
    }
    set_schema_version(&tx, CURRENT_SCHEMA_VERSION)?;
    tx.commit()?;

    Ok(true)
}

/// v1: history log and saved searches
fn migrate_v0_to_v1(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS search_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            query TEXT NOT NULL,
            result_count INTEGER NOT NULL DEFAULT 0,
            searched_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS saved_searches (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            query TEXT NOT NULL,
            filter TEXT,
            usage_count INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_saved_searches_name
            ON saved_searches(name);",
    )
}

/// v2: query lookup index and last-used tracking
fn migrate_v1_to_v2(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_search_history_query
            ON search_history(query COLLATE NOCASE);

        ALTER TABLE saved_searches ADD COLUMN last_used_at INTEGER;",
    )
}

/// v3: saved-search names are unique regardless of case
fn migrate_v2_to_v3(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "DROP INDEX IF EXISTS idx_saved_searches_name;

        CREATE UNIQUE INDEX idx_saved_searches_name
            ON saved_searches(name COLLATE NOCASE);",
    )
}
