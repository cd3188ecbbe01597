//! Error types for the search core
//!
//! Each layer has its own error enum; everything crossing the public
//! boundary is folded into [`SearchError`] so callers can branch on kind.

use thiserror::Error;

/// Which blocklisted signature the sanitizer tripped on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionKind {
    Keyword,
    Comment,
    StatementTerminator,
    Tautology,
    Union,
    NullByte,
    FileFunction,
}

/// Failures raised by the FTS query sanitizer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanitizeError {
    #[error("search query is empty")]
    Empty,
    // Message never names the matched signature.
    #[error("invalid query")]
    Rejected(InjectionKind),
    #[error("query is {len} characters, maximum is {max}")]
    TooLong { len: usize, max: usize },
}

/// Structural problems found by `validate_fts_query`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FtsSyntaxError {
    #[error("unbalanced double quotes")]
    UnbalancedQuotes,
    #[error("unbalanced parentheses")]
    UnbalancedParens,
    #[error("operator {0} has no operand")]
    DanglingOperator(String),
}

/// Errors from the storage collaborator
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database connection lock poisoned")]
    LockPoisoned,
    #[error("storage task failed: {0}")]
    Task(String),
    #[error("storage is unavailable: {0}")]
    Unavailable(String),
    #[error("statement ran past its deadline")]
    DeadlineExceeded,
}

impl StorageError {
    /// A UNIQUE constraint rejected the write
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            StorageError::Sqlite(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

/// Public error taxonomy for every search and history entry point
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search query is empty")]
    EmptyQuery,
    #[error("invalid search syntax: {0}")]
    InvalidSyntax(String),
    #[error("invalid regular expression: {0}")]
    InvalidPattern(String),
    #[error("invalid query")]
    InjectionRejected,
    #[error("{operation} failed: {source}")]
    StorageFailure {
        operation: &'static str,
        #[source]
        source: StorageError,
    },
    #[error("{operation} timed out after {after_ms} ms")]
    Timeout { operation: &'static str, after_ms: u64 },
    #[error("saved search not found: {0}")]
    NotFound(String),
    #[error("a saved search named '{0}' already exists")]
    DuplicateName(String),
}

impl SearchError {
    pub fn storage(operation: &'static str, source: StorageError) -> Self {
        SearchError::StorageFailure { operation, source }
    }

    /// Stable tag for callers that branch on the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            SearchError::EmptyQuery => "empty_query",
            SearchError::InvalidSyntax(_) => "invalid_syntax",
            SearchError::InvalidPattern(_) => "invalid_pattern",
            SearchError::InjectionRejected => "injection_rejected",
            SearchError::StorageFailure { .. } => "storage_failure",
            SearchError::Timeout { .. } => "timeout",
            SearchError::NotFound(_) => "not_found",
            SearchError::DuplicateName(_) => "duplicate_name",
        }
    }
}

impl From<SanitizeError> for SearchError {
    fn from(err: SanitizeError) -> Self {
        match err {
            SanitizeError::Empty => SearchError::EmptyQuery,
            SanitizeError::Rejected(_) => SearchError::InjectionRejected,
            SanitizeError::TooLong { .. } => SearchError::InvalidSyntax(err.to_string()),
        }
    }
}

impl From<FtsSyntaxError> for SearchError {
    fn from(err: FtsSyntaxError) -> Self {
        SearchError::InvalidSyntax(err.to_string())
    }
}
