//! Translation tables the search builders query
//!
//! The translator application owns these tables; this DDL documents the
//! shape the generated SQL expects and sets them up for embedded use and
//! tests. Every FTS5 table carries an explicit UNINDEXED back-reference to
//! its backing row, so joins never depend on rowid correspondence.

use rusqlite::Connection;

pub const TRANSLATION_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS languages (
    id TEXT PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS translation_units (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    key TEXT NOT NULL,
    source_text TEXT NOT NULL,
    source_file TEXT,
    is_obsolete INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS translation_versions (
    id TEXT PRIMARY KEY,
    unit_id TEXT NOT NULL,
    language_id TEXT NOT NULL,
    translated_text TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS translation_memory (
    id TEXT PRIMARY KEY,
    source_text TEXT NOT NULL,
    target_text TEXT NOT NULL,
    source_language_id TEXT,
    target_language_id TEXT,
    quality_score REAL,
    usage_count INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS glossary_entries (
    id TEXT PRIMARY KEY,
    term TEXT NOT NULL,
    translation TEXT NOT NULL,
    notes TEXT,
    category TEXT,
    language_code TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_units_project ON translation_units(project_id);
CREATE INDEX IF NOT EXISTS idx_versions_unit ON translation_versions(unit_id);

CREATE VIRTUAL TABLE IF NOT EXISTS translation_units_fts USING fts5(
    key, source_text, unit_id UNINDEXED,
    tokenize = 'unicode61 remove_diacritics 2'
);

CREATE VIRTUAL TABLE IF NOT EXISTS translation_versions_fts USING fts5(
    translated_text, version_id UNINDEXED,
    tokenize = 'unicode61 remove_diacritics 2'
);

CREATE VIRTUAL TABLE IF NOT EXISTS translation_memory_fts USING fts5(
    source_text, target_text, memory_id UNINDEXED,
    tokenize = 'unicode61 remove_diacritics 2'
);

CREATE TRIGGER IF NOT EXISTS trg_units_fts_insert AFTER INSERT ON translation_units BEGIN
    INSERT INTO translation_units_fts (key, source_text, unit_id)
    VALUES (new.key, new.source_text, new.id);
END;

CREATE TRIGGER IF NOT EXISTS trg_units_fts_delete AFTER DELETE ON translation_units BEGIN
    DELETE FROM translation_units_fts WHERE unit_id = old.id;
END;

CREATE TRIGGER IF NOT EXISTS trg_units_fts_update AFTER UPDATE OF key, source_text ON translation_units BEGIN
    DELETE FROM translation_units_fts WHERE unit_id = old.id;
    INSERT INTO translation_units_fts (key, source_text, unit_id)
    VALUES (new.key, new.source_text, new.id);
END;

CREATE TRIGGER IF NOT EXISTS trg_versions_fts_insert AFTER INSERT ON translation_versions BEGIN
    INSERT INTO translation_versions_fts (translated_text, version_id)
    VALUES (new.translated_text, new.id);
END;

CREATE TRIGGER IF NOT EXISTS trg_versions_fts_delete AFTER DELETE ON translation_versions BEGIN
    DELETE FROM translation_versions_fts WHERE version_id = old.id;
END;

CREATE TRIGGER IF NOT EXISTS trg_versions_fts_update AFTER UPDATE OF translated_text ON translation_versions BEGIN
    DELETE FROM translation_versions_fts WHERE version_id = old.id;
    INSERT INTO translation_versions_fts (translated_text, version_id)
    VALUES (new.translated_text, new.id);
END;

CREATE TRIGGER IF NOT EXISTS trg_memory_fts_insert AFTER INSERT ON translation_memory BEGIN
    INSERT INTO translation_memory_fts (source_text, target_text, memory_id)
    VALUES (new.source_text, new.target_text, new.id);
END;

CREATE TRIGGER IF NOT EXISTS trg_memory_fts_delete AFTER DELETE ON translation_memory BEGIN
    DELETE FROM translation_memory_fts WHERE memory_id = old.id;
END;

CREATE TRIGGER IF NOT EXISTS trg_memory_fts_update AFTER UPDATE OF source_text, target_text ON translation_memory BEGIN
    DELETE FROM translation_memory_fts WHERE memory_id = old.id;
    INSERT INTO translation_memory_fts (source_text, target_text, memory_id)
    VALUES (new.source_text, new.target_text, new.id);
END;
";

/// Create the translation tables, FTS indexes and sync triggers if missing
pub fn ensure_translation_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(TRANSLATION_SCHEMA)
}

/// Check if the unit FTS table has anything indexed
pub fn has_fts_data(conn: &Connection) -> bool {
    conn.query_row("SELECT COUNT(*) FROM translation_units_fts", [], |row| {
        row.get::<_, i64>(0)
    })
    .map(|count| count > 0)
    .unwrap_or(false)
}

/// Rebuild all three FTS tables from their backing tables
pub fn rebuild_fts_indexes(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "DELETE FROM translation_units_fts;
        INSERT INTO translation_units_fts (key, source_text, unit_id)
            SELECT key, source_text, id FROM translation_units;

        DELETE FROM translation_versions_fts;
        INSERT INTO translation_versions_fts (translated_text, version_id)
            SELECT translated_text, id FROM translation_versions;

        DELETE FROM translation_memory_fts;
        INSERT INTO translation_memory_fts (source_text, target_text, memory_id)
            SELECT source_text, target_text, id FROM translation_memory;",
    )?;
    log::info!("[Schema] Rebuilt FTS indexes");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triggers_keep_fts_in_sync() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_translation_schema(&conn).unwrap();
        assert!(!has_fts_data(&conn));

        conn.execute(
            "INSERT INTO translation_units (id, project_id, key, source_text, created_at, updated_at)
             VALUES ('u1', 'p1', 'unit_emperor', 'The emperor rides', 0, 0)",
            [],
        )
        .unwrap();
        assert!(has_fts_data(&conn));

        conn.execute(
            "UPDATE translation_units SET source_text = 'The general rides' WHERE id = 'u1'",
            [],
        )
        .unwrap();
        let hits: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM translation_units_fts WHERE translation_units_fts MATCH 'general'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(hits, 1);

        conn.execute("DELETE FROM translation_units WHERE id = 'u1'", []).unwrap();
        assert!(!has_fts_data(&conn));
    }

    #[test]
    fn test_rebuild_restores_index() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_translation_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO translation_units (id, project_id, key, source_text, created_at, updated_at)
             VALUES ('u1', 'p1', 'k', 'cavalry', 0, 0)",
            [],
        )
        .unwrap();
        conn.execute("DELETE FROM translation_units_fts", []).unwrap();
        assert!(!has_fts_data(&conn));

        rebuild_fts_indexes(&conn).unwrap();
        assert!(has_fts_data(&conn));
    }
}
