//! Storage collaborator
//!
//! The search core only needs "run this SQL, give me rows". Anything that
//! can do that implements [`Storage`]; [`SqliteStorage`] is the real one.

mod migrations;
pub mod schema;
mod sqlite;

pub use migrations::{get_schema_version, run_migrations, CURRENT_SCHEMA_VERSION};
pub use rusqlite::types::Value;
pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Instant;

use crate::error::StorageError;

/// One result row keyed by column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: HashMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: Value) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: &str, value: Value) {
        self.columns.insert(column.to_string(), value);
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// Text value; integers and reals are stringified, NULL and blobs are `None`
    pub fn text(&self, column: &str) -> Option<String> {
        match self.columns.get(column)? {
            Value::Text(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Real(f) => Some(f.to_string()),
            Value::Null | Value::Blob(_) => None,
        }
    }

    pub fn int(&self, column: &str) -> Option<i64> {
        match self.columns.get(column)? {
            Value::Integer(i) => Some(*i),
            Value::Real(f) => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn real(&self, column: &str) -> Option<f64> {
        match self.columns.get(column)? {
            Value::Real(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Epoch-milliseconds column as a UTC timestamp
    pub fn timestamp(&self, column: &str) -> Option<DateTime<Utc>> {
        self.int(column).and_then(DateTime::from_timestamp_millis)
    }
}

/// Raw query execution, the only thing the search core asks of the database
#[async_trait]
pub trait Storage: Send + Sync {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, StorageError>;

    /// Run a statement that returns no rows; yields the number of rows changed
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<usize, StorageError>;

    /// Like `query`, but the statement gives up once `deadline` passes.
    /// Backends that cannot abort a running statement just run it.
    async fn query_until(
        &self,
        sql: &str,
        params: &[Value],
        _deadline: Instant,
    ) -> Result<Vec<Row>, StorageError> {
        self.query(sql, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_getters_coerce() {
        let row = Row::new()
            .with("id", Value::Integer(7))
            .with("score", Value::Text("0.5".into()))
            .with("name", Value::Null);

        assert_eq!(row.text("id").as_deref(), Some("7"));
        assert_eq!(row.real("score"), Some(0.5));
        assert_eq!(row.text("name"), None);
        assert_eq!(row.text("missing"), None);
    }

    #[test]
    fn test_row_timestamp_from_millis() {
        let row = Row::new().with("created_at", Value::Integer(1_700_000_000_000));
        let ts = row.timestamp("created_at").unwrap();
        assert_eq!(ts.timestamp_millis(), 1_700_000_000_000);
    }
}
