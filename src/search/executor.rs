//! Search execution
//!
//! Every entry point follows the same pipeline: reject empty text, validate
//! FTS syntax, sanitize, build the expression and SQL, run it under the
//! configured timeout, map rows, record history.

use rustc_hash::FxHashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::fts_builder::{BuildOptions, FtsQueryBuilder, UNIT_KEY_COLUMN};
use super::history::HistoryManager;
use super::mapper::{row_to_result, Highlighter};
use super::query_parser::{build_fts_expression, parse_simple_query, with_column_filter};
use super::regex_builder::{pattern_for_options, validate_pattern, RegexQueryBuilder};
use super::sanitizer::{sanitize, validate_fts_query};
use super::sql::{clamp_limit, BuiltQuery, SelectQuery};
use super::filters::apply_min_relevance;
use crate::config::{SearchConfig, ALLOWED_PAGE_SIZES};
use crate::error::{SearchError, StorageError};
use crate::models::{
    RegexSearchIn, SearchFilter, SearchOperator, SearchOptions, SearchQuery, SearchResult,
    SearchResultType, SearchResultsModel, SearchScope, MIN_QUERY_LENGTH,
};
use crate::storage::{Row, Storage};

/// Prefix that marks pattern searches in history
pub const REGEX_HISTORY_PREFIX: &str = "REGEX: ";

/// A validated, sanitized query ready for the FTS builders
struct PreparedText {
    expression: String,
    terms: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
enum FtsSource<'a> {
    Units { key_only: bool },
    Versions,
    Memory { target_language: Option<&'a str> },
}

impl FtsSource<'_> {
    fn operation(&self) -> &'static str {
        match self {
            FtsSource::Units { .. } => "search_units",
            FtsSource::Versions => "search_versions",
            FtsSource::Memory { .. } => "search_memory",
        }
    }

    fn result_type(&self) -> SearchResultType {
        match self {
            FtsSource::Units { .. } => SearchResultType::TranslationUnit,
            FtsSource::Versions => SearchResultType::TranslationVersion,
            FtsSource::Memory { .. } => SearchResultType::TranslationMemory,
        }
    }
}

/// One page of results and, when counted, the total number of matches
struct Page {
    results: Vec<SearchResult>,
    total: Option<usize>,
}

/// Runs searches against a [`Storage`] and records them in history
#[derive(Clone)]
pub struct SearchService {
    storage: Arc<dyn Storage>,
    history: HistoryManager,
    fts: FtsQueryBuilder,
    regex: RegexQueryBuilder,
    config: SearchConfig,
}

impl SearchService {
    pub fn new(storage: Arc<dyn Storage>, history: HistoryManager, config: SearchConfig) -> Self {
        let config = config.normalized();
        Self {
            storage,
            history,
            fts: FtsQueryBuilder::from_config(&config),
            regex: RegexQueryBuilder::from_config(&config),
            config,
        }
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Public entry points
    // ------------------------------------------------------------------

    /// Search translation unit keys and source text
    pub async fn search_units(
        &self,
        query: &str,
        filter: Option<&SearchFilter>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let start = Instant::now();
        let prepared = prepare_fts(query, SearchOperator::And, &SearchOptions::default())?;
        let page = self
            .run_fts(
                FtsSource::Units { key_only: false },
                &prepared,
                filter,
                limit,
                offset,
                BuildOptions::default(),
                false,
            )
            .await?;
        self.finish("units", query, query, page.results, start).await
    }

    /// Search translated text
    pub async fn search_versions(
        &self,
        query: &str,
        filter: Option<&SearchFilter>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let start = Instant::now();
        let prepared = prepare_fts(query, SearchOperator::And, &SearchOptions::default())?;
        let page = self
            .run_fts(
                FtsSource::Versions,
                &prepared,
                filter,
                limit,
                offset,
                BuildOptions::default(),
                false,
            )
            .await?;
        self.finish("versions", query, query, page.results, start).await
    }

    /// Search translation memory, optionally restricted to one target language
    pub async fn search_memory(
        &self,
        query: &str,
        target_language: Option<&str>,
        filter: Option<&SearchFilter>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let start = Instant::now();
        let prepared = prepare_fts(query, SearchOperator::And, &SearchOptions::default())?;
        let page = self
            .run_fts(
                FtsSource::Memory { target_language },
                &prepared,
                filter,
                limit,
                offset,
                BuildOptions::default(),
                false,
            )
            .await?;
        self.finish("memory", query, query, page.results, start).await
    }

    /// Substring search over glossary terms, translations and notes
    pub async fn search_glossary(
        &self,
        query: &str,
        filter: Option<&SearchFilter>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let start = Instant::now();
        let text = query.trim();
        if text.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        validate_fts_query(text)?;
        // Gate only: the LIKE pattern is bound, so the raw text is used as typed
        sanitize(text)?;

        let built = self.fts.glossary(text, filter, limit, offset).build();
        let rows = self.run_query("search_glossary", built).await?;
        let terms = vec![text.to_string()];
        let results = apply_min_relevance(
            self.map_rows(&rows, SearchResultType::GlossaryEntry, &Highlighter::Terms(&terms)),
            filter,
        );
        self.finish("glossary", query, query, results, start).await
    }

    /// Units, versions and translation memory searched concurrently and merged
    ///
    /// Each source contributes at most `limit / 3` hits. A failing source is
    /// dropped; the call fails only when every source failed.
    pub async fn search_all(
        &self,
        query: &str,
        filter: Option<&SearchFilter>,
        limit: i64,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let start = Instant::now();
        let prepared = prepare_fts(query, SearchOperator::And, &SearchOptions::default())?;
        let limit = clamp_limit(limit, self.config.max_limit);
        let results = self
            .run_all(&prepared, filter, limit, BuildOptions::default())
            .await?;
        self.finish("all", query, query, results, start).await
    }

    /// REGEXP search; slow, unranked, conservative default limit
    pub async fn search_with_regex(
        &self,
        pattern: &str,
        search_in: RegexSearchIn,
        filter: Option<&SearchFilter>,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let start = Instant::now();
        let page = self
            .run_regex(pattern, search_in, filter, limit, offset, BuildOptions::default(), false)
            .await?;
        let entry = format!("{}{}", REGEX_HISTORY_PREFIX, pattern);
        self.finish("regex", pattern, &entry, page.results, start).await
    }

    /// Run a full [`SearchQuery`] and return one page of results (1-based)
    pub async fn search(&self, query: &SearchQuery, page: usize) -> Result<SearchResultsModel, SearchError> {
        let start = Instant::now();
        if query.text.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        if !query.is_valid() {
            return Err(SearchError::InvalidSyntax(format!(
                "query must be at least {} characters",
                MIN_QUERY_LENGTH
            )));
        }

        let page = page.max(1);
        let page_size = self.page_size(query.options.results_per_page);
        let offset = (page - 1) * page_size;
        let filter = query.filter.as_ref();
        let build = BuildOptions {
            include_obsolete: query.options.include_obsolete,
        };
        let count = self.config.count_totals;

        let (results, total, exact, history_entry) = if query.options.use_regex {
            let search_in = match query.scope {
                SearchScope::Source => RegexSearchIn::Source,
                SearchScope::Key => RegexSearchIn::Key,
                SearchScope::Target => RegexSearchIn::Target,
                SearchScope::Both | SearchScope::All => RegexSearchIn::Both,
            };
            let pattern = pattern_for_options(query.text.trim(), &query.options);
            let fetched = self
                .run_regex(
                    &pattern,
                    search_in,
                    filter,
                    Some(page_size as i64),
                    offset as i64,
                    build,
                    count,
                )
                .await?;
            let entry = format!("{}{}", REGEX_HISTORY_PREFIX, query.text.trim());
            let (total, exact) = totals(&fetched, offset);
            (fetched.results, total, exact, entry)
        } else {
            let prepared = prepare_fts(&query.text, query.operator, &query.options)?;
            let single = match query.scope {
                SearchScope::Source => Some(FtsSource::Units { key_only: false }),
                SearchScope::Key => Some(FtsSource::Units { key_only: true }),
                SearchScope::Target => Some(FtsSource::Versions),
                SearchScope::Both | SearchScope::All => None,
            };

            match single {
                Some(source) => {
                    let fetched = self
                        .run_fts(
                            source,
                            &prepared,
                            filter,
                            page_size as i64,
                            offset as i64,
                            build,
                            count,
                        )
                        .await?;
                    let (total, exact) = totals(&fetched, offset);
                    (fetched.results, total, exact, query.text.trim().to_string())
                }
                None => {
                    // Fan-out: fetch everything up to the end of this page, then cut the page out
                    let window = (offset + page_size).min(self.config.max_limit);
                    let merged = if query.scope == SearchScope::All {
                        self.run_all(&prepared, filter, window, build).await?
                    } else {
                        self.run_units_and_versions(&prepared, filter, window, build).await?
                    };
                    let results: Vec<SearchResult> =
                        merged.into_iter().skip(offset).take(page_size).collect();
                    let total = offset + results.len();
                    (results, total, false, query.text.trim().to_string())
                }
            }
        };

        log::info!(
            "[Search] {:?} '{}' page {} -> {} of {} results in {:?}",
            query.scope,
            query.text.trim(),
            page,
            results.len(),
            total,
            start.elapsed()
        );
        self.record(&history_entry, results.len()).await;

        Ok(SearchResultsModel {
            results,
            total_count: total,
            total_is_exact: exact,
            current_page: page,
            page_size,
            query: query.clone(),
        })
    }

    /// Load a saved search and run it; only a successful run counts as a use
    pub async fn execute_saved_search(&self, id: &str, page: usize) -> Result<SearchResultsModel, SearchError> {
        let saved = self.history.get_saved_search(id).await?;
        log::debug!("[Search] Executing saved search '{}'", saved.name);
        let query = SearchQuery::new(saved.query).with_filter(saved.filter);
        let model = self.search(&query, page).await?;
        self.history.increment_usage(id).await?;
        Ok(model)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn page_size(&self, requested: usize) -> usize {
        if ALLOWED_PAGE_SIZES.contains(&requested) {
            requested
        } else {
            self.config.default_page_size
        }
    }

    /// Execute one statement under the configured timeout.
    ///
    /// The storage aborts its own statement at the deadline; the outer
    /// timer only stops waiting (on the lock, or on a backend that cannot
    /// abort) and never touches statements issued by other callers.
    async fn run_query(&self, operation: &'static str, built: BuiltQuery) -> Result<Vec<Row>, SearchError> {
        log::debug!("[Search] {} SQL: {}", operation, built.sql);

        let timeout_ms = self.config.query_timeout_ms;
        if timeout_ms == 0 {
            return self
                .storage
                .query(&built.sql, &built.params)
                .await
                .map_err(|e| SearchError::storage(operation, e));
        }

        let timeout = Duration::from_millis(timeout_ms);
        let pending = self
            .storage
            .query_until(&built.sql, &built.params, Instant::now() + timeout);
        let timed_out = || {
            log::warn!("[Search] {} timed out after {} ms", operation, timeout_ms);
            SearchError::Timeout {
                operation,
                after_ms: timeout_ms,
            }
        };

        match tokio::time::timeout(timeout, pending).await {
            Ok(Ok(rows)) => Ok(rows),
            Ok(Err(StorageError::DeadlineExceeded)) | Err(_) => Err(timed_out()),
            Ok(Err(e)) => Err(SearchError::storage(operation, e)),
        }
    }

    async fn run_count(&self, operation: &'static str, query: &SelectQuery) -> Result<usize, SearchError> {
        let rows = self.run_query(operation, query.build_count()).await?;
        Ok(rows
            .first()
            .and_then(|r| r.int("total"))
            .unwrap_or(0)
            .max(0) as usize)
    }

    fn map_rows(&self, rows: &[Row], default_type: SearchResultType, highlighter: &Highlighter<'_>) -> Vec<SearchResult> {
        rows.iter()
            .map(|row| row_to_result(row, default_type, highlighter, self.config.snippet_width))
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_fts(
        &self,
        source: FtsSource<'_>,
        prepared: &PreparedText,
        filter: Option<&SearchFilter>,
        limit: i64,
        offset: i64,
        options: BuildOptions,
        with_total: bool,
    ) -> Result<Page, SearchError> {
        let query = match source {
            FtsSource::Units { key_only } => {
                let expression = if key_only {
                    with_column_filter(&prepared.expression, &[UNIT_KEY_COLUMN])
                } else {
                    prepared.expression.clone()
                };
                self.fts.units(&expression, filter, limit, offset, options)
            }
            FtsSource::Versions => self.fts.versions(&prepared.expression, filter, limit, offset, options),
            FtsSource::Memory { target_language } => {
                self.fts
                    .memory(&prepared.expression, target_language, filter, limit, offset)
            }
        };

        let operation = source.operation();
        let rows = self.run_query(operation, query.build()).await?;
        let results = self.map_rows(&rows, source.result_type(), &Highlighter::Terms(&prepared.terms));
        let total = if with_total {
            Some(self.run_count(operation, &query).await?)
        } else {
            None
        };
        Ok(Page { results, total })
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_regex(
        &self,
        pattern: &str,
        search_in: RegexSearchIn,
        filter: Option<&SearchFilter>,
        limit: Option<i64>,
        offset: i64,
        options: BuildOptions,
        with_total: bool,
    ) -> Result<Page, SearchError> {
        let regex = validate_pattern(pattern)?;
        let query = self
            .regex
            .build_query(pattern, search_in, filter, limit, offset, options)?;

        let rows = self.run_query("search_with_regex", query.build()).await?;
        let results = apply_min_relevance(
            self.map_rows(&rows, SearchResultType::TranslationUnit, &Highlighter::Pattern(&regex)),
            filter,
        );
        let total = if with_total {
            Some(self.run_count("search_with_regex", &query).await?)
        } else {
            None
        };
        Ok(Page { results, total })
    }

    /// Three-way fan-out; each branch gets `limit / 3` (at least one)
    async fn run_all(
        &self,
        prepared: &PreparedText,
        filter: Option<&SearchFilter>,
        limit: usize,
        options: BuildOptions,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let per_source = (limit / 3).max(1) as i64;
        let (units, versions, memory) = tokio::join!(
            self.run_fts(FtsSource::Units { key_only: false }, prepared, filter, per_source, 0, options, false),
            self.run_fts(FtsSource::Versions, prepared, filter, per_source, 0, options, false),
            self.run_fts(FtsSource::Memory { target_language: None }, prepared, filter, per_source, 0, options, false),
        );
        merge_branches(
            vec![("units", units), ("versions", versions), ("memory", memory)],
            limit,
        )
    }

    /// Units and versions fan-out for `SearchScope::Both`
    async fn run_units_and_versions(
        &self,
        prepared: &PreparedText,
        filter: Option<&SearchFilter>,
        limit: usize,
        options: BuildOptions,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let limit_i64 = limit as i64;
        let (units, versions) = tokio::join!(
            self.run_fts(FtsSource::Units { key_only: false }, prepared, filter, limit_i64, 0, options, false),
            self.run_fts(FtsSource::Versions, prepared, filter, limit_i64, 0, options, false),
        );
        merge_branches(vec![("units", units), ("versions", versions)], limit)
    }

    /// Log, record history (best effort), and hand the results back
    async fn finish(
        &self,
        source: &str,
        query: &str,
        history_entry: &str,
        results: Vec<SearchResult>,
        start: Instant,
    ) -> Result<Vec<SearchResult>, SearchError> {
        log::info!(
            "[Search] {} '{}' -> {} results in {:?}",
            source,
            query.trim(),
            results.len(),
            start.elapsed()
        );
        self.record(history_entry.trim(), results.len()).await;
        Ok(results)
    }

    async fn record(&self, entry: &str, result_count: usize) {
        if let Err(e) = self.history.add_to_history(entry, result_count).await {
            log::warn!("[Search] Failed to record history: {}", e);
        }
    }
}

/// Reject empty text, validate syntax, sanitize, and build the FTS expression
fn prepare_fts(raw: &str, operator: SearchOperator, options: &SearchOptions) -> Result<PreparedText, SearchError> {
    if raw.trim().is_empty() {
        return Err(SearchError::EmptyQuery);
    }
    validate_fts_query(raw)?;
    let sanitized = sanitize(raw)?;
    // Stripping characters can strand an operator ("horse AND ???")
    validate_fts_query(&sanitized)?;
    let expression = build_fts_expression(&sanitized, operator, options);
    log::debug!("[Search] FTS expression: {}", expression);
    Ok(PreparedText {
        expression,
        terms: parse_simple_query(raw).terms,
    })
}

fn totals(page: &Page, offset: usize) -> (usize, bool) {
    match page.total {
        Some(total) => (total, true),
        None => (offset + page.results.len(), false),
    }
}

/// Merge branch results: drop failed branches, dedupe, sort by relevance, truncate
fn merge_branches(
    branches: Vec<(&'static str, Result<Page, SearchError>)>,
    limit: usize,
) -> Result<Vec<SearchResult>, SearchError> {
    let mut merged = Vec::new();
    let mut seen: FxHashSet<(SearchResultType, String)> = FxHashSet::default();
    let mut first_error = None;
    let mut succeeded = 0;

    for (name, branch) in branches {
        match branch {
            Ok(page) => {
                succeeded += 1;
                for result in page.results {
                    if seen.insert((result.result_type, result.id.clone())) {
                        merged.push(result);
                    }
                }
            }
            Err(e) => {
                log::warn!("[Search] Dropping failed {} branch: {}", name, e);
                first_error.get_or_insert(e);
            }
        }
    }

    if succeeded == 0 {
        if let Some(e) = first_error {
            return Err(e);
        }
    }

    merged.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
    merged.truncate(limit);
    Ok(merged)
}
