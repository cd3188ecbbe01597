//! SQLite-backed storage
//!
//! The connection lives behind a mutex; each call runs on tokio's blocking
//! pool so async callers never stall on SQLite I/O.

use async_trait::async_trait;
use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection, ErrorCode};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use super::{migrations, Row, Storage, Value};
use crate::error::StorageError;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// VM instructions between deadline checks
const PROGRESS_STEPS: i32 = 1000;

pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
    db_path: Option<PathBuf>,
}

impl SqliteStorage {
    /// Open (or create) a database file and bring its schema up to date
    pub fn open(db_path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::Unavailable(format!("Failed to create database directory: {}", e)))?;
        }
        let conn = Connection::open(db_path)?;
        log::info!("[Storage] Opened database at {:?}", db_path);
        Self::from_connection(conn, Some(db_path.to_path_buf()))
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    fn from_connection(conn: Connection, db_path: Option<PathBuf>) -> Result<Self, StorageError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        register_regexp(&conn)?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path,
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Synchronous access for setup work (schema creation, seeding)
    pub fn with_connection<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    {
        let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        f(&conn).map_err(StorageError::from)
    }

    async fn run_blocking<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StorageError::LockPoisoned)?;
            f(&conn)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, StorageError> {
        let sql = sql.to_string();
        let params = params.to_vec();
        self.run_blocking(move |conn| Ok(select_rows(conn, &sql, &params)?))
            .await
    }

    /// The deadline is checked on this statement's own connection, after the
    /// lock is held, so other callers' statements are never aborted.
    async fn query_until(
        &self,
        sql: &str,
        params: &[Value],
        deadline: Instant,
    ) -> Result<Vec<Row>, StorageError> {
        let sql = sql.to_string();
        let params = params.to_vec();
        self.run_blocking(move |conn| {
            if Instant::now() >= deadline {
                return Err(StorageError::DeadlineExceeded);
            }
            conn.progress_handler(PROGRESS_STEPS, Some(move || Instant::now() >= deadline));
            let rows = select_rows(conn, &sql, &params);
            conn.progress_handler(0, None::<fn() -> bool>);

            rows.map_err(|e| {
                if e.sqlite_error_code() == Some(ErrorCode::OperationInterrupted) {
                    log::warn!("[Storage] Statement aborted at its deadline");
                    StorageError::DeadlineExceeded
                } else {
                    StorageError::from(e)
                }
            })
        })
        .await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<usize, StorageError> {
        let sql = sql.to_string();
        let params = params.to_vec();
        self.run_blocking(move |conn| Ok(conn.execute(&sql, params_from_iter(params.iter()))?))
            .await
    }
}

fn select_rows(conn: &Connection, sql: &str, params: &[Value]) -> rusqlite::Result<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().iter().map(|n| n.to_string()).collect();
    let mut rows = stmt.query(params_from_iter(params.iter()))?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut mapped = Row::new();
        for (idx, name) in names.iter().enumerate() {
            mapped.insert(name, row.get::<_, Value>(idx)?);
        }
        out.push(mapped);
    }
    Ok(out)
}

/// Install `regexp(pattern, text)` so `text REGEXP pattern` works.
/// Compiled patterns are cached per statement as auxiliary data.
fn register_regexp(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        move |ctx| {
            let regex: Arc<Regex> = ctx.get_or_create_aux(0, |vr| -> Result<_, BoxError> {
                Ok(Regex::new(vr.as_str()?)?)
            })?;
            let is_match = match ctx.get_raw(1) {
                ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                    .map(|text| regex.is_match(text))
                    .unwrap_or(false),
                _ => false,
            };
            Ok(is_match)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_query_maps_columns_by_name() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let rows = storage
            .query("SELECT 1 AS one, 'two' AS two, NULL AS three", &[])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].int("one"), Some(1));
        assert_eq!(rows[0].text("two").as_deref(), Some("two"));
        assert_eq!(rows[0].get("three"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_regexp_function_is_registered() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let rows = storage
            .query(
                "SELECT 'Imperial Guard' REGEXP ?1 AS hit, NULL REGEXP ?1 AS null_hit",
                &[Value::Text("^Imp.*Guard$".into())],
            )
            .await
            .unwrap();
        assert_eq!(rows[0].int("hit"), Some(1));
        assert_eq!(rows[0].int("null_hit"), Some(0));
    }

    #[tokio::test]
    async fn test_execute_reports_changes() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage
            .execute("CREATE TABLE t (v INTEGER)", &[])
            .await
            .unwrap();
        let changed = storage
            .execute("INSERT INTO t (v) VALUES (?1), (?2)", &[Value::Integer(1), Value::Integer(2)])
            .await
            .unwrap();
        assert_eq!(changed, 2);
    }

    const LONG_COUNT: &str = "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 50000000) \
         SELECT COUNT(*) AS n FROM c";

    #[tokio::test]
    async fn test_query_until_aborts_at_deadline() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let deadline = Instant::now() + std::time::Duration::from_millis(50);
        let err = storage.query_until(LONG_COUNT, &[], deadline).await.unwrap_err();
        assert!(matches!(err, StorageError::DeadlineExceeded));

        // The handler is gone afterwards; plain queries still run to completion
        let rows = storage.query("SELECT 1 AS one", &[]).await.unwrap();
        assert_eq!(rows[0].int("one"), Some(1));
    }

    #[tokio::test]
    async fn test_query_until_with_expired_deadline_skips_statement() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let err = storage
            .query_until("SELECT 1 AS one", &[], Instant::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DeadlineExceeded));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_deadline_does_not_abort_other_statements() {
        let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());

        let long = {
            let storage = Arc::clone(&storage);
            tokio::spawn(async move {
                storage
                    .query(
                        "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 3000000) \
                         SELECT COUNT(*) AS n FROM c",
                        &[],
                    )
                    .await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // Queued behind the long statement; it expires without touching it
        let deadline = Instant::now() + std::time::Duration::from_millis(10);
        let short = storage.query_until("SELECT 1 AS one", &[], deadline).await;
        assert!(matches!(short, Err(StorageError::DeadlineExceeded)));

        let rows = long.await.unwrap().unwrap();
        assert_eq!(rows[0].int("n"), Some(3000000));
    }

    #[test]
    fn test_open_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("search.db");
        let storage = SqliteStorage::open(&db_path).unwrap();
        assert!(db_path.exists());
        assert_eq!(storage.db_path(), Some(db_path.as_path()));
    }
}
