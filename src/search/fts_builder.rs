//! SQLite FTS5 query construction
//!
//! Builds ranked MATCH queries against the three FTS5 tables plus the
//! LIKE-based glossary query. Every FTS table is joined to its backing
//! table through its explicit back-reference column (`unit_id`,
//! `version_id`, `memory_id`), never through rowid.
//!
//! The MATCH expression is interpolated into the SQL text. It must come
//! from `sanitize` + `build_fts_expression`; this module does not escape
//! it again.

use super::filters::{filter_predicates, FilterColumns};
use super::sql::{clamp_limit, clamp_offset, quote_literal, JoinKind, SelectQuery};
use crate::config::SearchConfig;
use crate::models::SearchFilter;
use crate::storage::Value;

pub const UNITS_FTS: &str = "translation_units_fts";
pub const VERSIONS_FTS: &str = "translation_versions_fts";
pub const MEMORY_FTS: &str = "translation_memory_fts";

/// Columns of the unit FTS table a scope can restrict to
pub const UNIT_KEY_COLUMN: &str = "key";

/// Options shared by the FTS builders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub include_obsolete: bool,
}

#[derive(Debug, Clone)]
pub struct FtsQueryBuilder {
    max_limit: usize,
    max_offset: usize,
    snippet_tokens: u32,
}

impl Default for FtsQueryBuilder {
    fn default() -> Self {
        Self::from_config(&SearchConfig::default())
    }
}

/// Relevance is FTS5's bm25 `rank` negated, so larger means more relevant
fn relevance_expr(fts_table: &str) -> String {
    format!("(-{}.rank)", fts_table)
}

fn match_predicate(fts_table: &str, sanitized_expression: &str) -> String {
    format!("{} MATCH '{}'", fts_table, sanitized_expression)
}

impl FtsQueryBuilder {
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            max_limit: config.max_limit,
            max_offset: config.max_offset,
            snippet_tokens: config.highlight_window_tokens,
        }
    }

    fn snippet_expr(&self, fts_table: &str, column: i32) -> String {
        format!(
            "snippet({}, {}, '<mark>', '</mark>', '...', {})",
            fts_table, column, self.snippet_tokens
        )
    }

    fn ranked(&self, query: SelectQuery, fts_table: &str, limit: i64, offset: i64) -> SelectQuery {
        query
            .column(&relevance_expr(fts_table), "relevance_score")
            .order_by("relevance_score DESC")
            .limit(clamp_limit(limit, self.max_limit))
            .offset(clamp_offset(offset, self.max_offset))
    }

    /// Search unit keys and source text
    pub fn units(
        &self,
        sanitized_expression: &str,
        filter: Option<&SearchFilter>,
        limit: i64,
        offset: i64,
        options: BuildOptions,
    ) -> SelectQuery {
        let columns = FilterColumns {
            project_id: Some("tu.project_id"),
            file_name: Some("tu.source_file"),
            updated_at: Some("tu.updated_at"),
            relevance: Some(UNITS_RELEVANCE),
            ..Default::default()
        };

        let mut query = SelectQuery::from(UNITS_FTS)
            .column("tu.id", "id")
            .column("tu.project_id", "project_id")
            .column("p.name", "project_name")
            .column("NULL", "language_code")
            .column("NULL", "language_name")
            .column("tu.key", "key")
            .column("tu.source_text", "source_text")
            .column("NULL", "translated_text")
            .column("NULL", "status")
            .column("NULL", "category")
            .column(&self.snippet_expr(UNITS_FTS, -1), "highlighted_text")
            .column("tu.created_at", "created_at")
            .column("tu.updated_at", "updated_at")
            .join(
                JoinKind::Inner,
                "translation_units",
                "tu",
                "tu.id = translation_units_fts.unit_id",
            )
            .join(JoinKind::Left, "projects", "p", "p.id = tu.project_id")
            .predicate(match_predicate(UNITS_FTS, sanitized_expression));

        if !options.include_obsolete {
            query = query.predicate("tu.is_obsolete = 0");
        }
        query = query.predicates(filter_predicates(filter, &columns));
        self.ranked(query, UNITS_FTS, limit, offset)
    }

    /// Search translated text, with the owning unit's key and source for context
    pub fn versions(
        &self,
        sanitized_expression: &str,
        filter: Option<&SearchFilter>,
        limit: i64,
        offset: i64,
        options: BuildOptions,
    ) -> SelectQuery {
        let columns = FilterColumns {
            project_id: Some("tu.project_id"),
            language_code: Some("l.code"),
            status: Some("tv.status"),
            file_name: Some("tu.source_file"),
            updated_at: Some("tv.updated_at"),
            relevance: Some(VERSIONS_RELEVANCE),
        };

        let mut query = SelectQuery::from(VERSIONS_FTS)
            .column("tv.id", "id")
            .column("tu.project_id", "project_id")
            .column("p.name", "project_name")
            .column("l.code", "language_code")
            .column("l.name", "language_name")
            .column("tu.key", "key")
            .column("tu.source_text", "source_text")
            .column("tv.translated_text", "translated_text")
            .column("tv.status", "status")
            .column("NULL", "category")
            .column(&self.snippet_expr(VERSIONS_FTS, 0), "highlighted_text")
            .column("tv.created_at", "created_at")
            .column("tv.updated_at", "updated_at")
            .join(
                JoinKind::Inner,
                "translation_versions",
                "tv",
                "tv.id = translation_versions_fts.version_id",
            )
            .join(JoinKind::Inner, "translation_units", "tu", "tu.id = tv.unit_id")
            .join(JoinKind::Left, "projects", "p", "p.id = tu.project_id")
            .join(JoinKind::Left, "languages", "l", "l.id = tv.language_id")
            .predicate(match_predicate(VERSIONS_FTS, sanitized_expression));

        if !options.include_obsolete {
            query = query.predicate("tu.is_obsolete = 0");
        }
        query = query.predicates(filter_predicates(filter, &columns));
        self.ranked(query, VERSIONS_FTS, limit, offset)
    }

    /// Search translation memory source/target pairs
    pub fn memory(
        &self,
        sanitized_expression: &str,
        target_language: Option<&str>,
        filter: Option<&SearchFilter>,
        limit: i64,
        offset: i64,
    ) -> SelectQuery {
        let columns = FilterColumns {
            language_code: Some("tl.code"),
            updated_at: Some("tm.updated_at"),
            relevance: Some(MEMORY_RELEVANCE),
            ..Default::default()
        };

        let mut query = SelectQuery::from(MEMORY_FTS)
            .column("tm.id", "id")
            .column("NULL", "project_id")
            .column("NULL", "project_name")
            .column("tl.code", "language_code")
            .column("tl.name", "language_name")
            .column("NULL", "key")
            .column("tm.source_text", "source_text")
            .column("tm.target_text", "translated_text")
            .column("NULL", "status")
            .column("NULL", "category")
            .column(&self.snippet_expr(MEMORY_FTS, -1), "highlighted_text")
            .column("tm.created_at", "created_at")
            .column("tm.updated_at", "updated_at")
            .join(
                JoinKind::Inner,
                "translation_memory",
                "tm",
                "tm.id = translation_memory_fts.memory_id",
            )
            .join(JoinKind::Left, "languages", "sl", "sl.id = tm.source_language_id")
            .join(JoinKind::Left, "languages", "tl", "tl.id = tm.target_language_id")
            .predicate(match_predicate(MEMORY_FTS, sanitized_expression));

        if let Some(code) = target_language.filter(|c| !c.trim().is_empty()) {
            query = query.predicate(format!("tl.code = {}", quote_literal(code.trim())));
        }
        query = query.predicates(filter_predicates(filter, &columns));
        self.ranked(query, MEMORY_FTS, limit, offset)
    }

    /// Substring search over glossary term, translation and notes.
    /// No relevance signal exists here, so every hit scores 1.0 and
    /// results are ordered by term.
    pub fn glossary(
        &self,
        text: &str,
        filter: Option<&SearchFilter>,
        limit: i64,
        offset: i64,
    ) -> SelectQuery {
        let columns = FilterColumns {
            language_code: Some("ge.language_code"),
            updated_at: Some("ge.updated_at"),
            ..Default::default()
        };

        SelectQuery::from("glossary_entries ge")
            .column("ge.id", "id")
            .column("NULL", "project_id")
            .column("NULL", "project_name")
            .column("ge.language_code", "language_code")
            .column("NULL", "language_name")
            .column("NULL", "key")
            .column("ge.term", "source_text")
            .column("ge.translation", "translated_text")
            .column("ge.notes", "notes")
            .column("NULL", "status")
            .column("ge.category", "category")
            .column(
                "CASE WHEN ge.term LIKE ?1 ESCAPE '\\' THEN 'source_text' \
                 WHEN ge.translation LIKE ?1 ESCAPE '\\' THEN 'translated_text' \
                 ELSE 'notes' END",
                "matched_field",
            )
            .column("1.0", "relevance_score")
            .column("ge.created_at", "created_at")
            .column("ge.updated_at", "updated_at")
            .predicate(
                "(ge.term LIKE ?1 ESCAPE '\\' OR ge.translation LIKE ?1 ESCAPE '\\' \
                 OR ge.notes LIKE ?1 ESCAPE '\\')",
            )
            .predicates(filter_predicates(filter, &columns))
            .order_by("ge.term COLLATE NOCASE ASC")
            .limit(clamp_limit(limit, self.max_limit))
            .offset(clamp_offset(offset, self.max_offset))
            .param(Value::Text(like_pattern(text)))
    }
}

const UNITS_RELEVANCE: &str = "(-translation_units_fts.rank)";
const VERSIONS_RELEVANCE: &str = "(-translation_versions_fts.rank)";
const MEMORY_RELEVANCE: &str = "(-translation_memory_fts.rank)";

/// `%text%` with LIKE wildcards escaped by backslash
pub fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchFilter;

    fn builder() -> FtsQueryBuilder {
        FtsQueryBuilder::default()
    }

    #[test]
    fn test_units_query_shape() {
        let sql = builder()
            .units("emperor", None, 50, 0, BuildOptions::default())
            .render();

        assert!(sql.contains("FROM translation_units_fts"));
        assert!(sql.contains("INNER JOIN translation_units tu ON tu.id = translation_units_fts.unit_id"));
        assert!(sql.contains("LEFT JOIN projects p ON p.id = tu.project_id"));
        assert!(sql.contains("WHERE translation_units_fts MATCH 'emperor'"));
        assert!(sql.contains("tu.is_obsolete = 0"));
        assert!(sql.contains("snippet(translation_units_fts, -1, '<mark>', '</mark>', '...', 20)"));
        assert!(sql.contains("(-translation_units_fts.rank) AS relevance_score"));
        assert!(sql.ends_with("ORDER BY relevance_score DESC LIMIT 50 OFFSET 0"));
    }

    #[test]
    fn test_match_expression_is_not_escaped_twice() {
        let sql = builder()
            .units("\"emperor''s\"", None, 10, 0, BuildOptions::default())
            .render();
        assert!(sql.contains("MATCH '\"emperor''s\"'"));
    }

    #[test]
    fn test_limits_are_clamped() {
        let sql = builder()
            .units("emperor", None, 5000, -3, BuildOptions::default())
            .render();
        assert!(sql.ends_with("LIMIT 1000 OFFSET 0"));

        let sql = builder()
            .versions("emperor", None, 0, 2_000_000, BuildOptions::default())
            .render();
        assert!(sql.ends_with("LIMIT 1 OFFSET 1000000"));
    }

    #[test]
    fn test_include_obsolete_drops_predicate() {
        let sql = builder()
            .units("emperor", None, 10, 0, BuildOptions { include_obsolete: true })
            .render();
        assert!(!sql.contains("is_obsolete"));
    }

    #[test]
    fn test_versions_join_through_unit() {
        let filter = SearchFilter {
            language_codes: Some(vec!["de".into()]),
            statuses: Some(vec!["translated".into()]),
            ..Default::default()
        };
        let sql = builder()
            .versions("krieg", Some(&filter), 25, 25, BuildOptions::default())
            .render();

        assert!(sql.contains("INNER JOIN translation_versions tv ON tv.id = translation_versions_fts.version_id"));
        assert!(sql.contains("INNER JOIN translation_units tu ON tu.id = tv.unit_id"));
        assert!(sql.contains("LEFT JOIN languages l ON l.id = tv.language_id"));
        assert!(sql.contains("l.code IN ('de')"));
        assert!(sql.contains("tv.status IN ('translated')"));
    }

    #[test]
    fn test_memory_target_language() {
        let sql = builder()
            .memory("sword", Some("fr"), None, 10, 0)
            .render();
        assert!(sql.contains("INNER JOIN translation_memory tm ON tm.id = translation_memory_fts.memory_id"));
        assert!(sql.contains("tl.code = 'fr'"));

        let sql = builder().memory("sword", Some("  "), None, 10, 0).render();
        assert!(!sql.contains("tl.code ="));
    }

    #[test]
    fn test_min_relevance_uses_rank() {
        let filter = SearchFilter {
            min_relevance: Some(1.5),
            ..Default::default()
        };
        let sql = builder()
            .units("emperor", Some(&filter), 10, 0, BuildOptions::default())
            .render();
        assert!(sql.contains("(-translation_units_fts.rank) >= 1.5"));
    }

    #[test]
    fn test_glossary_binds_like_pattern() {
        let query = builder().glossary("50%_off", None, 20, 0);
        let sql = query.render();
        assert!(sql.contains("FROM glossary_entries ge"));
        assert!(sql.contains("ge.term LIKE ?1 ESCAPE '\\'"));
        assert!(sql.contains("1.0 AS relevance_score"));
        assert!(sql.contains("ORDER BY ge.term COLLATE NOCASE ASC"));
        assert!(!sql.contains("MATCH"));
        assert_eq!(query.params(), &[Value::Text("%50\\%\\_off%".into())]);
    }
}
