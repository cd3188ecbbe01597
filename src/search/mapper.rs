//! Row -> SearchResult mapping

use regex::Regex;

use super::{context_snippet, find_case_insensitive, find_regex, highlight_regex, highlight_terms, CharSpan};
use crate::models::{MatchedField, SearchResult, SearchResultType};
use crate::storage::Row;

/// What the mapper highlights when the SQL did not produce a snippet
pub enum Highlighter<'a> {
    Terms(&'a [String]),
    Pattern(&'a Regex),
}

impl Highlighter<'_> {
    fn locate(&self, text: &str) -> Option<CharSpan> {
        match self {
            Highlighter::Terms(terms) => terms.iter().find_map(|t| find_case_insensitive(text, t)),
            Highlighter::Pattern(regex) => find_regex(text, regex),
        }
    }

    fn highlight(&self, text: &str) -> String {
        match self {
            Highlighter::Terms(terms) => highlight_terms(text, terms),
            Highlighter::Pattern(regex) => highlight_regex(text, regex),
        }
    }
}

fn parse_result_type(value: &str) -> Option<SearchResultType> {
    match value {
        "translation_unit" => Some(SearchResultType::TranslationUnit),
        "translation_version" => Some(SearchResultType::TranslationVersion),
        "translation_memory" => Some(SearchResultType::TranslationMemory),
        "glossary_entry" => Some(SearchResultType::GlossaryEntry),
        _ => None,
    }
}

fn field_text(row: &Row, field: MatchedField) -> Option<String> {
    row.text(field.as_str())
}

/// Pick the field that matched: the first of key, source, translation that
/// contains a hit, else the first non-null one in that order
fn infer_matched_field(row: &Row, highlighter: &Highlighter<'_>) -> MatchedField {
    const PRIORITY: [MatchedField; 3] = [
        MatchedField::Key,
        MatchedField::SourceText,
        MatchedField::TranslatedText,
    ];

    PRIORITY
        .iter()
        .copied()
        .find(|field| {
            field_text(row, *field)
                .map(|text| highlighter.locate(&text).is_some())
                .unwrap_or(false)
        })
        .or_else(|| {
            PRIORITY
                .iter()
                .copied()
                .find(|field| field_text(row, *field).is_some())
        })
        .unwrap_or(MatchedField::SourceText)
}

/// Map one storage row into a uniformly shaped result
pub fn row_to_result(
    row: &Row,
    default_type: SearchResultType,
    highlighter: &Highlighter<'_>,
    snippet_width: usize,
) -> SearchResult {
    let matched_field = row
        .text("matched_field")
        .and_then(|f| MatchedField::parse(&f))
        .unwrap_or_else(|| infer_matched_field(row, highlighter));

    let target_text = field_text(row, matched_field).unwrap_or_default();
    let span = highlighter.locate(&target_text);

    let highlighted_text = row
        .text("highlighted_text")
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| highlighter.highlight(&target_text));

    SearchResult {
        id: row.text("id").unwrap_or_default(),
        result_type: row
            .text("result_type")
            .and_then(|t| parse_result_type(&t))
            .unwrap_or(default_type),
        project_id: row.text("project_id"),
        project_name: row.text("project_name"),
        language_code: row.text("language_code"),
        language_name: row.text("language_name"),
        key: row.text("key"),
        source_text: row.text("source_text"),
        translated_text: row.text("translated_text"),
        matched_field,
        highlighted_text,
        relevance_score: row.real("relevance_score").unwrap_or(1.0),
        context: context_snippet(&target_text, span, snippet_width),
        status: row.text("status"),
        category: row.text("category"),
        created_at: row.timestamp("created_at"),
        updated_at: row.timestamp("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Value;

    fn unit_row(key: &str, source: &str) -> Row {
        Row::new()
            .with("id", Value::Text("u1".into()))
            .with("key", Value::Text(key.into()))
            .with("source_text", Value::Text(source.into()))
            .with("translated_text", Value::Null)
            .with("relevance_score", Value::Real(2.5))
            .with("created_at", Value::Integer(1_700_000_000_000))
    }

    #[test]
    fn test_matched_field_prefers_field_with_hit() {
        let terms = vec!["emperor".to_string()];
        let row = unit_row("unit_general_01", "The Emperor commands");
        let result = row_to_result(&row, SearchResultType::TranslationUnit, &Highlighter::Terms(&terms), 50);

        assert_eq!(result.matched_field, MatchedField::SourceText);
        assert_eq!(result.highlighted_text, "The <mark>Emperor</mark> commands");
        assert_eq!(result.context, "The Emperor commands");
        assert_eq!(result.relevance_score, 2.5);
        assert!(result.created_at.is_some());
    }

    #[test]
    fn test_matched_field_key_wins_priority() {
        let terms = vec!["emperor".to_string()];
        let row = unit_row("emperor_title", "The Emperor commands");
        let result = row_to_result(&row, SearchResultType::TranslationUnit, &Highlighter::Terms(&terms), 50);
        assert_eq!(result.matched_field, MatchedField::Key);
    }

    #[test]
    fn test_stemmed_match_falls_back_to_first_non_null() {
        // FTS can match "riding" for "ride" without a verbatim substring
        let terms = vec!["rides".to_string()];
        let row = Row::new()
            .with("id", Value::Text("v1".into()))
            .with("key", Value::Null)
            .with("source_text", Value::Null)
            .with("translated_text", Value::Text("riding forth".into()))
            .with("highlighted_text", Value::Text("<mark>riding</mark> forth".into()));
        let result = row_to_result(&row, SearchResultType::TranslationVersion, &Highlighter::Terms(&terms), 50);

        assert_eq!(result.matched_field, MatchedField::TranslatedText);
        assert_eq!(result.highlighted_text, "<mark>riding</mark> forth");
        assert_eq!(result.context, "riding forth");
        assert_eq!(result.relevance_score, 1.0);
    }

    #[test]
    fn test_explicit_columns_override_defaults() {
        let regex = Regex::new("(?i)guard").unwrap();
        let row = Row::new()
            .with("id", Value::Text("v9".into()))
            .with("result_type", Value::Text("translation_version".into()))
            .with("matched_field", Value::Text("translated_text".into()))
            .with("source_text", Value::Text("Guard".into()))
            .with("translated_text", Value::Text("Garde guard".into()));
        let result = row_to_result(&row, SearchResultType::TranslationUnit, &Highlighter::Pattern(&regex), 50);

        assert_eq!(result.result_type, SearchResultType::TranslationVersion);
        assert_eq!(result.matched_field, MatchedField::TranslatedText);
        assert_eq!(result.highlighted_text, "Garde <mark>guard</mark>");
    }
}
