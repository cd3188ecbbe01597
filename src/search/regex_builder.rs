//! REGEXP-based fallback search
//!
//! Pattern searches scan the backing tables row by row (no index, no
//! ranking), so this path is much slower than FTS5 and defaults to a small
//! limit. The pattern is validated with the `regex` crate, the same engine
//! the storage layer registers as `regexp()`.

use regex::Regex;

use super::filters::{filter_predicates, FilterColumns};
use super::fts_builder::BuildOptions;
use super::sql::{clamp_limit, clamp_offset, escape_sql_literal, JoinKind, SelectQuery};
use crate::config::{RegexBinding, SearchConfig};
use crate::error::SearchError;
use crate::models::{RegexSearchIn, SearchFilter, SearchOptions};
use crate::storage::Value;

/// Compile a pattern, mapping failures to `InvalidPattern`
pub fn validate_pattern(pattern: &str) -> Result<Regex, SearchError> {
    if pattern.trim().is_empty() {
        return Err(SearchError::EmptyQuery);
    }
    Regex::new(pattern).map_err(|e| SearchError::InvalidPattern(e.to_string()))
}

/// Validate a pattern and escape it for interpolation into a SQL literal
pub fn validate_and_escape(pattern: &str) -> Result<String, SearchError> {
    validate_pattern(pattern)?;
    Ok(escape_sql_literal(pattern))
}

/// Apply case sensitivity and whole-word options to a user pattern
pub fn pattern_for_options(pattern: &str, options: &SearchOptions) -> String {
    let mut composed = if options.whole_word {
        format!(r"\b(?:{})\b", pattern)
    } else {
        pattern.to_string()
    };
    if !options.case_sensitive {
        composed = format!("(?i){}", composed);
    }
    composed
}

#[derive(Debug, Clone)]
pub struct RegexQueryBuilder {
    max_limit: usize,
    max_offset: usize,
    default_limit: usize,
    binding: RegexBinding,
}

impl Default for RegexQueryBuilder {
    fn default() -> Self {
        Self::from_config(&SearchConfig::default())
    }
}

impl RegexQueryBuilder {
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            max_limit: config.max_limit,
            max_offset: config.max_offset,
            default_limit: config.regex_default_limit,
            binding: config.regex_binding,
        }
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// Build a REGEXP query over unit keys, source text and/or versions
    ///
    /// `Both` is a UNION ALL of unit rows whose source matches and version
    /// rows whose translation matches, so a source-only hit is reported once
    /// as a unit. On a version row where the source matches too,
    /// `matched_field` reports the source text.
    pub fn build_query(
        &self,
        pattern: &str,
        search_in: RegexSearchIn,
        filter: Option<&SearchFilter>,
        limit: Option<i64>,
        offset: i64,
        options: BuildOptions,
    ) -> Result<SelectQuery, SearchError> {
        validate_pattern(pattern)?;

        let (pattern_sql, param) = match self.binding {
            RegexBinding::Parameter => ("?1".to_string(), Some(Value::Text(pattern.to_string()))),
            RegexBinding::Inline => (format!("'{}'", validate_and_escape(pattern)?), None),
        };
        let key_match = format!("tu.key REGEXP {}", pattern_sql);
        let source_match = format!("tu.source_text REGEXP {}", pattern_sql);
        let target_match = format!("tv.translated_text REGEXP {}", pattern_sql);

        let restrict = |query: SelectQuery, columns: &FilterColumns| {
            let query = if options.include_obsolete {
                query
            } else {
                query.predicate("tu.is_obsolete = 0")
            };
            query.predicates(filter_predicates(filter, columns))
        };

        let query = match search_in {
            RegexSearchIn::Key => restrict(unit_hits(&key_match, "'key'"), &UNIT_FILTERS)
                .order_by("tu.key ASC")
                .order_by("id ASC"),
            RegexSearchIn::Source => restrict(unit_hits(&source_match, "'source_text'"), &UNIT_FILTERS)
                .order_by("tu.key ASC")
                .order_by("id ASC"),
            RegexSearchIn::Target => {
                restrict(version_hits(&target_match, "'translated_text'"), &VERSION_FILTERS)
                    .order_by("tu.key ASC")
                    .order_by("id ASC")
            }
            RegexSearchIn::Both => {
                let units = restrict(unit_hits(&source_match, "'source_text'"), &UNIT_FILTERS);
                let tie_break = format!(
                    "CASE WHEN {} THEN 'source_text' ELSE 'translated_text' END",
                    source_match
                );
                let versions = restrict(version_hits(&target_match, &tie_break), &VERSION_FILTERS);

                HIT_COLUMNS
                    .iter()
                    .fold(SelectQuery::from_union_all(&[units, versions], "hits"), |q, name| {
                        q.column(&format!("hits.{}", name), name)
                    })
                    .order_by("hits.key ASC")
                    .order_by("hits.id ASC")
            }
        };

        let limit = limit.unwrap_or(self.default_limit as i64);
        let mut query = query
            .limit(clamp_limit(limit, self.max_limit))
            .offset(clamp_offset(offset, self.max_offset));
        if let Some(param) = param {
            query = query.param(param);
        }
        Ok(query)
    }
}

/// Column order shared by unit and version hits; UNION ALL pairs by position
const HIT_COLUMNS: [&str; 14] = [
    "id",
    "result_type",
    "project_id",
    "project_name",
    "language_code",
    "language_name",
    "key",
    "source_text",
    "translated_text",
    "status",
    "matched_field",
    "relevance_score",
    "created_at",
    "updated_at",
];

const UNIT_FILTERS: FilterColumns = FilterColumns {
    project_id: Some("tu.project_id"),
    language_code: None,
    status: None,
    file_name: Some("tu.source_file"),
    updated_at: Some("tu.updated_at"),
    relevance: None,
};

const VERSION_FILTERS: FilterColumns = FilterColumns {
    project_id: Some("tu.project_id"),
    language_code: Some("l.code"),
    status: Some("tv.status"),
    file_name: Some("tu.source_file"),
    updated_at: Some("tv.updated_at"),
    relevance: None,
};

/// One row per translation unit matching `predicate`
fn unit_hits(predicate: &str, matched_field: &str) -> SelectQuery {
    SelectQuery::from("translation_units tu")
        .column("tu.id", "id")
        .column("'translation_unit'", "result_type")
        .column("tu.project_id", "project_id")
        .column("p.name", "project_name")
        .column("NULL", "language_code")
        .column("NULL", "language_name")
        .column("tu.key", "key")
        .column("tu.source_text", "source_text")
        .column("NULL", "translated_text")
        .column("NULL", "status")
        .column(matched_field, "matched_field")
        .column("1.0", "relevance_score")
        .column("tu.created_at", "created_at")
        .column("tu.updated_at", "updated_at")
        .join(JoinKind::Left, "projects", "p", "p.id = tu.project_id")
        .predicate(predicate)
}

/// One row per translation version matching `predicate`
fn version_hits(predicate: &str, matched_field: &str) -> SelectQuery {
    SelectQuery::from("translation_versions tv")
        .column("tv.id", "id")
        .column("'translation_version'", "result_type")
        .column("tu.project_id", "project_id")
        .column("p.name", "project_name")
        .column("l.code", "language_code")
        .column("l.name", "language_name")
        .column("tu.key", "key")
        .column("tu.source_text", "source_text")
        .column("tv.translated_text", "translated_text")
        .column("tv.status", "status")
        .column(matched_field, "matched_field")
        .column("1.0", "relevance_score")
        .column("tv.created_at", "created_at")
        .column("tv.updated_at", "updated_at")
        .join(JoinKind::Inner, "translation_units", "tu", "tu.id = tv.unit_id")
        .join(JoinKind::Left, "languages", "l", "l.id = tv.language_id")
        .join(JoinKind::Left, "projects", "p", "p.id = tu.project_id")
        .predicate(predicate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let err = validate_and_escape("[invalid").unwrap_err();
        assert!(matches!(err, SearchError::InvalidPattern(_)));

        let err = RegexQueryBuilder::default()
            .build_query("[invalid", RegexSearchIn::Both, None, None, 0, BuildOptions::default())
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidPattern(_)));
    }

    #[test]
    fn test_escape_doubles_single_quotes() {
        assert_eq!(validate_and_escape("emperor's").unwrap(), "emperor''s");
        assert!(matches!(validate_and_escape("  "), Err(SearchError::EmptyQuery)));
    }

    #[test]
    fn test_parameter_binding_by_default() {
        let query = RegexQueryBuilder::default()
            .build_query("^Imp.*", RegexSearchIn::Source, None, None, 0, BuildOptions::default())
            .unwrap();
        let sql = query.render();
        assert!(sql.contains("tu.source_text REGEXP ?1"));
        assert!(!sql.contains("translation_versions"));
        assert!(sql.ends_with("LIMIT 100 OFFSET 0"));
        assert_eq!(query.params(), &[Value::Text("^Imp.*".into())]);
    }

    #[test]
    fn test_inline_binding_escapes() {
        let config = SearchConfig {
            regex_binding: RegexBinding::Inline,
            ..Default::default()
        };
        let query = RegexQueryBuilder::from_config(&config)
            .build_query("o'neil", RegexSearchIn::Target, None, Some(10), 0, BuildOptions::default())
            .unwrap();
        let sql = query.render();
        assert!(sql.contains("tv.translated_text REGEXP 'o''neil'"));
        assert!(query.params().is_empty());
    }

    #[test]
    fn test_both_unions_unit_and_version_hits() {
        let query = RegexQueryBuilder::default()
            .build_query("guard", RegexSearchIn::Both, None, Some(5000), 0, BuildOptions::default())
            .unwrap();
        let sql = query.render();
        assert!(sql.contains("'translation_unit' AS result_type"));
        assert!(sql.contains("WHERE tu.source_text REGEXP ?1 AND tu.is_obsolete = 0 UNION ALL"));
        assert!(sql.contains("WHERE tv.translated_text REGEXP ?1 AND tu.is_obsolete = 0) hits"));
        assert!(sql.contains(
            "CASE WHEN tu.source_text REGEXP ?1 THEN 'source_text' ELSE 'translated_text' END AS matched_field"
        ));
        assert!(!sql.contains("COALESCE(tv.id, tu.id)"));
        assert!(sql.ends_with("ORDER BY hits.key ASC, hits.id ASC LIMIT 1000 OFFSET 0"));
        assert_eq!(query.params().len(), 1);
        assert!(query.render_count().starts_with("SELECT COUNT(*) AS total FROM (SELECT tu.id AS id"));
    }

    #[test]
    fn test_key_scope_matches_key_column() {
        let sql = RegexQueryBuilder::default()
            .build_query("^unit_", RegexSearchIn::Key, None, None, 0, BuildOptions::default())
            .unwrap()
            .render();
        assert!(sql.contains("WHERE tu.key REGEXP ?1"));
        assert!(sql.contains("'key' AS matched_field"));
        assert!(!sql.contains("tu.source_text REGEXP"));
    }

    #[test]
    fn test_filters_apply_to_regex_path() {
        let filter = SearchFilter {
            project_ids: Some(vec!["p1".into()]),
            statuses: Some(vec!["reviewed".into()]),
            ..Default::default()
        };
        let sql = RegexQueryBuilder::default()
            .build_query("x+", RegexSearchIn::Target, Some(&filter), None, 0, BuildOptions::default())
            .unwrap()
            .render();
        assert!(sql.contains("tu.project_id IN ('p1')"));
        assert!(sql.contains("tv.status IN ('reviewed')"));
    }

    #[test]
    fn test_pattern_for_options() {
        let defaults = SearchOptions::default();
        assert_eq!(pattern_for_options("guard", &defaults), "(?i)guard");

        let strict = SearchOptions {
            case_sensitive: true,
            whole_word: true,
            ..Default::default()
        };
        assert_eq!(pattern_for_options("guard", &strict), r"\b(?:guard)\b");
    }
}
