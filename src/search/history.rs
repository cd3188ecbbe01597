use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::{SearchError, StorageError};
use crate::models::{
    QueryFrequency, SavedSearch, SavedSearchUpdate, SearchFilter, SearchHistoryEntry, SearchStatistics,
};
use crate::storage::{Row, Storage, Value};

use super::like_pattern;

/// Number of history entries kept unless configured otherwise
pub const DEFAULT_HISTORY_CAP: usize = 100;

const TOP_QUERY_COUNT: i64 = 5;

/// Search history and saved searches, persisted through the storage layer
///
/// History is an append-only log capped at `cap` entries (oldest evicted).
/// Saved searches are owned here; nothing else mutates them.
#[derive(Clone)]
pub struct HistoryManager {
    storage: Arc<dyn Storage>,
    cap: usize,
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn serialize_filter(filter: Option<&SearchFilter>) -> Value {
    match filter.filter(|f| !f.is_empty()) {
        Some(f) => match serde_json::to_string(f) {
            Ok(json) => Value::Text(json),
            Err(e) => {
                log::warn!("[History] Failed to serialize filter: {}", e);
                Value::Null
            }
        },
        None => Value::Null,
    }
}

/// The unique name index catches a concurrent save of the same name
fn name_conflict_or(operation: &'static str, name: &str, err: StorageError) -> SearchError {
    if err.is_constraint_violation() {
        SearchError::DuplicateName(name.to_string())
    } else {
        SearchError::storage(operation, err)
    }
}

fn row_to_saved_search(row: &Row) -> SavedSearch {
    let filter = row.text("filter").and_then(|json| {
        serde_json::from_str::<SearchFilter>(&json)
            .map_err(|e| log::warn!("[History] Ignoring unreadable saved filter: {}", e))
            .ok()
    });
    SavedSearch {
        id: row.text("id").unwrap_or_default(),
        name: row.text("name").unwrap_or_default(),
        query: row.text("query").unwrap_or_default(),
        filter,
        usage_count: row.int("usage_count").unwrap_or(0).max(0) as u64,
        created_at: row.timestamp("created_at").unwrap_or_default(),
        updated_at: row.timestamp("updated_at").unwrap_or_default(),
    }
}

fn row_to_history_entry(row: &Row) -> SearchHistoryEntry {
    SearchHistoryEntry {
        id: row.int("id").unwrap_or(0),
        query: row.text("query").unwrap_or_default(),
        result_count: row.int("result_count").unwrap_or(0).max(0) as usize,
        timestamp: row
            .int("searched_at")
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_default(),
    }
}

impl HistoryManager {
    pub fn new(storage: Arc<dyn Storage>, cap: usize) -> Self {
        Self {
            storage,
            cap: cap.max(1),
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Append a search to history and evict anything beyond the cap
    pub async fn add_to_history(&self, query: &str, result_count: usize) -> Result<(), SearchError> {
        // Don't add empty queries
        if query.trim().is_empty() {
            return Ok(());
        }

        self.storage
            .execute(
                "INSERT INTO search_history (query, result_count, searched_at) VALUES (?1, ?2, ?3)",
                &[text(query), Value::Integer(result_count as i64), Value::Integer(now_millis())],
            )
            .await
            .map_err(|e| SearchError::storage("add_to_history", e))?;

        let evicted = self
            .storage
            .execute(
                "DELETE FROM search_history WHERE id NOT IN (
                    SELECT id FROM search_history ORDER BY id DESC LIMIT ?1
                )",
                &[Value::Integer(self.cap as i64)],
            )
            .await
            .map_err(|e| SearchError::storage("add_to_history", e))?;
        if evicted > 0 {
            log::debug!("[History] Evicted {} old entries", evicted);
        }
        Ok(())
    }

    /// Most recent entries first
    pub async fn get_history(&self, limit: usize) -> Result<Vec<SearchHistoryEntry>, SearchError> {
        let rows = self
            .storage
            .query(
                "SELECT id, query, result_count, searched_at FROM search_history
                 ORDER BY id DESC LIMIT ?1",
                &[Value::Integer(limit as i64)],
            )
            .await
            .map_err(|e| SearchError::storage("get_history", e))?;
        Ok(rows.iter().map(row_to_history_entry).collect())
    }

    /// Delete all history; returns how many entries were removed
    pub async fn clear_history(&self) -> Result<usize, SearchError> {
        let cleared = self
            .storage
            .execute("DELETE FROM search_history", &[])
            .await
            .map_err(|e| SearchError::storage("clear_history", e))?;
        log::info!("[History] Cleared {} entries", cleared);
        Ok(cleared)
    }

    /// Remove every entry for a query (case-insensitive)
    pub async fn remove_from_history(&self, query: &str) -> Result<usize, SearchError> {
        self.storage
            .execute(
                "DELETE FROM search_history WHERE query = ?1 COLLATE NOCASE",
                &[text(query.trim())],
            )
            .await
            .map_err(|e| SearchError::storage("remove_from_history", e))
    }

    /// Distinct past queries starting with `prefix`, most recent first (for autocomplete)
    pub async fn suggestions(&self, prefix: &str, limit: usize) -> Result<Vec<String>, SearchError> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }
        // like_pattern gives %prefix%; drop the leading wildcard for a prefix match
        let pattern = like_pattern(prefix)[1..].to_string();
        let rows = self
            .storage
            .query(
                "SELECT query, MAX(id) AS last_id FROM search_history
                 WHERE query LIKE ?1 ESCAPE '\\'
                 GROUP BY lower(query)
                 ORDER BY last_id DESC LIMIT ?2",
                &[Value::Text(pattern), Value::Integer(limit as i64)],
            )
            .await
            .map_err(|e| SearchError::storage("suggestions", e))?;
        Ok(rows.iter().filter_map(|r| r.text("query")).collect())
    }

    // ------------------------------------------------------------------
    // Saved searches
    // ------------------------------------------------------------------

    async fn find_by_name(&self, name: &str) -> Result<Option<SavedSearch>, SearchError> {
        let rows = self
            .storage
            .query(
                "SELECT id, name, query, filter, usage_count, created_at, updated_at
                 FROM saved_searches WHERE name = ?1 COLLATE NOCASE",
                &[text(name)],
            )
            .await
            .map_err(|e| SearchError::storage("find_saved_search", e))?;
        Ok(rows.first().map(row_to_saved_search))
    }

    /// Create a saved search with a usage count of zero
    pub async fn save_search(
        &self,
        name: &str,
        query: &str,
        filter: Option<&SearchFilter>,
    ) -> Result<SavedSearch, SearchError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SearchError::InvalidSyntax("saved search name is empty".into()));
        }
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        if self.find_by_name(name).await?.is_some() {
            return Err(SearchError::DuplicateName(name.to_string()));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = now_millis();
        self.storage
            .execute(
                "INSERT INTO saved_searches (id, name, query, filter, usage_count, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
                &[text(&id), text(name), text(query), serialize_filter(filter), Value::Integer(now)],
            )
            .await
            .map_err(|e| name_conflict_or("save_search", name, e))?;

        log::info!("[History] Saved search '{}' ({})", name, id);
        self.get_saved_search(&id).await
    }

    /// All saved searches, most used first
    pub async fn get_saved_searches(&self) -> Result<Vec<SavedSearch>, SearchError> {
        let rows = self
            .storage
            .query(
                "SELECT id, name, query, filter, usage_count, created_at, updated_at
                 FROM saved_searches ORDER BY usage_count DESC, name ASC",
                &[],
            )
            .await
            .map_err(|e| SearchError::storage("get_saved_searches", e))?;
        Ok(rows.iter().map(row_to_saved_search).collect())
    }

    pub async fn get_saved_search(&self, id: &str) -> Result<SavedSearch, SearchError> {
        let rows = self
            .storage
            .query(
                "SELECT id, name, query, filter, usage_count, created_at, updated_at
                 FROM saved_searches WHERE id = ?1",
                &[text(id)],
            )
            .await
            .map_err(|e| SearchError::storage("get_saved_search", e))?;
        rows.first()
            .map(row_to_saved_search)
            .ok_or_else(|| SearchError::NotFound(id.to_string()))
    }

    /// Apply a partial update; unspecified fields keep their values
    pub async fn update_saved_search(
        &self,
        id: &str,
        update: SavedSearchUpdate,
    ) -> Result<SavedSearch, SearchError> {
        let existing = self.get_saved_search(id).await?;

        let name = match update.name {
            Some(name) => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(SearchError::InvalidSyntax("saved search name is empty".into()));
                }
                if let Some(other) = self.find_by_name(&name).await? {
                    if other.id != existing.id {
                        return Err(SearchError::DuplicateName(name));
                    }
                }
                name
            }
            None => existing.name,
        };
        let query = update.query.unwrap_or(existing.query);
        let filter = update.filter.unwrap_or(existing.filter);

        self.storage
            .execute(
                "UPDATE saved_searches SET name = ?1, query = ?2, filter = ?3, updated_at = ?4 WHERE id = ?5",
                &[
                    text(&name),
                    text(&query),
                    serialize_filter(filter.as_ref()),
                    Value::Integer(now_millis()),
                    text(id),
                ],
            )
            .await
            .map_err(|e| name_conflict_or("update_saved_search", &name, e))?;

        self.get_saved_search(id).await
    }

    pub async fn delete_saved_search(&self, id: &str) -> Result<(), SearchError> {
        let deleted = self
            .storage
            .execute("DELETE FROM saved_searches WHERE id = ?1", &[text(id)])
            .await
            .map_err(|e| SearchError::storage("delete_saved_search", e))?;
        if deleted == 0 {
            return Err(SearchError::NotFound(id.to_string()));
        }
        log::info!("[History] Deleted saved search {}", id);
        Ok(())
    }

    /// Bump the usage counter in a single UPDATE
    pub async fn increment_usage(&self, id: &str) -> Result<(), SearchError> {
        let updated = self
            .storage
            .execute(
                "UPDATE saved_searches SET usage_count = usage_count + 1, last_used_at = ?1 WHERE id = ?2",
                &[Value::Integer(now_millis()), text(id)],
            )
            .await
            .map_err(|e| SearchError::storage("increment_usage", e))?;
        if updated == 0 {
            return Err(SearchError::NotFound(id.to_string()));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    pub async fn get_statistics(&self) -> Result<SearchStatistics, SearchError> {
        let map_err = |e| SearchError::storage("get_statistics", e);

        let history = self
            .storage
            .query(
                "SELECT COUNT(*) AS total,
                        COUNT(DISTINCT lower(query)) AS unique_queries,
                        SUM(CASE WHEN result_count = 0 THEN 1 ELSE 0 END) AS zero_results,
                        AVG(result_count) AS average_results
                 FROM search_history",
                &[],
            )
            .await
            .map_err(map_err)?;
        let saved = self
            .storage
            .query(
                "SELECT COUNT(*) AS total, SUM(usage_count) AS uses FROM saved_searches",
                &[],
            )
            .await
            .map_err(map_err)?;
        let most_used = self
            .storage
            .query(
                "SELECT name FROM saved_searches WHERE usage_count > 0
                 ORDER BY usage_count DESC, name ASC LIMIT 1",
                &[],
            )
            .await
            .map_err(map_err)?;
        let top = self
            .storage
            .query(
                "SELECT query, COUNT(*) AS uses, MAX(id) AS last_id FROM search_history
                 GROUP BY lower(query) ORDER BY uses DESC, last_id DESC LIMIT ?1",
                &[Value::Integer(TOP_QUERY_COUNT)],
            )
            .await
            .map_err(map_err)?;

        let count = |rows: &[Row], column: &str| -> u64 {
            rows.first()
                .and_then(|r| r.int(column))
                .unwrap_or(0)
                .max(0) as u64
        };

        Ok(SearchStatistics {
            total_searches: count(&history, "total"),
            unique_queries: count(&history, "unique_queries"),
            zero_result_searches: count(&history, "zero_results"),
            average_result_count: history
                .first()
                .and_then(|r| r.real("average_results"))
                .unwrap_or(0.0),
            total_saved_searches: count(&saved, "total"),
            total_saved_search_uses: count(&saved, "uses"),
            most_used_saved_search: most_used.first().and_then(|r| r.text("name")),
            top_queries: top
                .iter()
                .map(|r| QueryFrequency {
                    query: r.text("query").unwrap_or_default(),
                    count: r.int("uses").unwrap_or(0).max(0) as u64,
                })
                .collect(),
        })
    }
}
