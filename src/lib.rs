//! Search core for the Total War mod translator
//!
//! Full-text search over translation units, translated versions, translation
//! memory and the glossary, backed by SQLite FTS5:
//! - `search`: sanitizer, query builders, executor, history
//! - `storage`: SQLite connection, schema and migrations
//! - `state`: wiring of storage, history and the search service

pub mod config;
pub mod error;
pub mod models;
pub mod search;
pub mod state;
pub mod storage;

pub use config::SearchConfig;
pub use error::{SearchError, StorageError};
pub use search::{HistoryManager, SearchService};
pub use state::SearchState;
pub use storage::{SqliteStorage, Storage};

/// Install the `env_logger` backend for the `log` facade
///
/// `RUST_LOG` still overrides `level`. Safe to call more than once.
pub fn init_logging(level: log::LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
}
