//! Application state management
//!
//! Central wiring for the search core:
//! - SQLite storage (schema + migrations applied on open)
//! - One history manager, shared with the search service
//! - The search service itself

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::SearchConfig;
use crate::error::StorageError;
use crate::search::{HistoryManager, SearchService};
use crate::storage::{schema, SqliteStorage, Storage};

/// Main application state
pub struct SearchState {
    /// SQLite database handle for translation data, FTS5 indexes and history
    pub storage: Arc<SqliteStorage>,

    /// Search history and saved searches
    pub history: HistoryManager,

    /// Search entry points
    pub search: SearchService,

    pub config: SearchConfig,
}

impl SearchState {
    /// Open (or create) the database at `db_path` and wire everything to it
    pub fn open(db_path: &Path, config: SearchConfig) -> Result<Self, StorageError> {
        let storage = SqliteStorage::open(db_path)?;
        Self::from_storage(storage, config)
    }

    /// Everything in memory, for tests and throwaway sessions
    pub fn in_memory(config: SearchConfig) -> Result<Self, StorageError> {
        let storage = SqliteStorage::open_in_memory()?;
        Self::from_storage(storage, config)
    }

    fn from_storage(storage: SqliteStorage, config: SearchConfig) -> Result<Self, StorageError> {
        let config = config.normalized();
        storage.with_connection(schema::ensure_translation_schema)?;

        let storage = Arc::new(storage);
        let shared: Arc<dyn Storage> = storage.clone();
        let history = HistoryManager::new(shared.clone(), config.history_cap);
        let search = SearchService::new(shared, history.clone(), config.clone());

        log::info!(
            "[State] Search core ready ({})",
            storage
                .db_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "in-memory".to_string())
        );

        Ok(Self {
            storage,
            history,
            search,
            config,
        })
    }

    /// Database file path, `None` for in-memory state
    pub fn db_path(&self) -> Option<PathBuf> {
        self.storage.db_path().map(Path::to_path_buf)
    }

    /// Whether the unit FTS index holds anything yet
    pub fn has_indexed_units(&self) -> bool {
        self.storage
            .with_connection(|conn| Ok(schema::has_fts_data(conn)))
            .unwrap_or(false)
    }

    /// Rebuild the FTS5 indexes from the backing tables
    pub fn rebuild_indexes(&self) -> Result<(), StorageError> {
        log::info!("[State] Rebuilding FTS5 indexes");
        self.storage.with_connection(schema::rebuild_fts_indexes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_state_shares_history() {
        let state = SearchState::in_memory(SearchConfig::default()).unwrap();
        assert!(state.db_path().is_none());

        state.history.add_to_history("emperor", 3).await.unwrap();
        let entries = state.search.history().get_history(10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].query, "emperor");
    }

    #[tokio::test]
    async fn test_open_file_backed_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("search.db");

        let state = SearchState::open(&path, SearchConfig::default()).unwrap();
        assert_eq!(state.db_path().as_deref(), Some(path.as_path()));
        assert!(path.exists());
        assert!(!state.has_indexed_units());
        state.rebuild_indexes().unwrap();
    }
}
