use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum trimmed length for a query to be submitted
pub const MIN_QUERY_LENGTH: usize = 2;

/// Which fields a search looks at
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    /// Unit key and source text
    #[default]
    Source,
    /// Translated text of versions
    Target,
    /// Units and versions together
    Both,
    /// Unit key only
    Key,
    /// Units, versions and translation memory
    All,
}

/// How bare terms are combined into an FTS expression
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchOperator {
    #[default]
    And,
    Or,
    Not,
}

/// Column selection for the REGEXP path
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RegexSearchIn {
    /// Unit keys only
    Key,
    Source,
    Target,
    #[default]
    Both,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    pub case_sensitive: bool,
    pub whole_word: bool,
    pub use_regex: bool,
    pub phrase_search: bool,
    pub prefix_search: bool,
    pub include_obsolete: bool,
    pub results_per_page: usize, // one of 25, 50, 100, 200
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            whole_word: false,
            use_regex: false,
            phrase_search: false,
            prefix_search: false,
            include_obsolete: false,
            results_per_page: 50,
        }
    }
}

/// Structured filters turned into additional `AND` predicates
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilter {
    pub project_ids: Option<Vec<String>>,
    pub language_codes: Option<Vec<String>>,
    pub statuses: Option<Vec<String>>,
    pub file_names: Option<Vec<String>>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub min_relevance: Option<f64>,
}

impl SearchFilter {
    /// True when no field is set at all
    pub fn is_empty(&self) -> bool {
        self.project_ids.is_none()
            && self.language_codes.is_none()
            && self.statuses.is_none()
            && self.file_names.is_none()
            && self.date_from.is_none()
            && self.date_to.is_none()
            && self.min_relevance.is_none()
    }
}

/// A complete search request. Edits produce a new value.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub text: String,
    pub scope: SearchScope,
    pub operator: SearchOperator,
    pub filter: Option<SearchFilter>,
    pub options: SearchOptions,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        Self { text: text.into(), ..self }
    }

    pub fn with_scope(self, scope: SearchScope) -> Self {
        Self { scope, ..self }
    }

    pub fn with_operator(self, operator: SearchOperator) -> Self {
        Self { operator, ..self }
    }

    pub fn with_filter(self, filter: Option<SearchFilter>) -> Self {
        Self { filter, ..self }
    }

    pub fn with_options(self, options: SearchOptions) -> Self {
        Self { options, ..self }
    }

    pub fn is_valid(&self) -> bool {
        self.text.trim().chars().count() >= MIN_QUERY_LENGTH
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SearchResultType {
    TranslationUnit,
    TranslationVersion,
    TranslationMemory,
    GlossaryEntry,
}

impl SearchResultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchResultType::TranslationUnit => "translation_unit",
            SearchResultType::TranslationVersion => "translation_version",
            SearchResultType::TranslationMemory => "translation_memory",
            SearchResultType::GlossaryEntry => "glossary_entry",
        }
    }
}

/// Column a result matched in
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchedField {
    Key,
    SourceText,
    TranslatedText,
    Notes,
}

impl MatchedField {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchedField::Key => "key",
            MatchedField::SourceText => "source_text",
            MatchedField::TranslatedText => "translated_text",
            MatchedField::Notes => "notes",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "key" => Some(MatchedField::Key),
            "source_text" => Some(MatchedField::SourceText),
            "translated_text" => Some(MatchedField::TranslatedText),
            "notes" => Some(MatchedField::Notes),
            _ => None,
        }
    }
}

/// One ranked hit, built per query and never persisted
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    pub result_type: SearchResultType,
    pub project_id: Option<String>,
    pub project_name: Option<String>,
    pub language_code: Option<String>,
    pub language_name: Option<String>,
    pub key: Option<String>,
    pub source_text: Option<String>,
    pub translated_text: Option<String>,
    pub matched_field: MatchedField,
    /// Matched text with `<mark>` spans around hits
    pub highlighted_text: String,
    pub relevance_score: f64,
    pub context: String,
    pub status: Option<String>,
    pub category: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A page of results plus paging metadata
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultsModel {
    pub results: Vec<SearchResult>,
    pub total_count: usize,
    /// False when `total_count` is only the size of this page
    pub total_is_exact: bool,
    pub current_page: usize, // 1-based
    pub page_size: usize,
    pub query: SearchQuery,
}

impl SearchResultsModel {
    pub fn empty(query: SearchQuery, page_size: usize) -> Self {
        Self {
            results: Vec::new(),
            total_count: 0,
            total_is_exact: true,
            current_page: 1,
            page_size,
            query,
        }
    }

    pub fn total_pages(&self) -> usize {
        if self.page_size == 0 {
            return 0;
        }
        self.total_count.div_ceil(self.page_size)
    }

    pub fn has_previous_page(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next_page(&self) -> bool {
        self.current_page < self.total_pages()
    }
}

/// Search history entry
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchHistoryEntry {
    pub id: i64,
    pub query: String,
    pub result_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Named, persisted query definition
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavedSearch {
    pub id: String,
    pub name: String,
    pub query: String,
    pub filter: Option<SearchFilter>,
    pub usage_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update for a saved search; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavedSearchUpdate {
    pub name: Option<String>,
    pub query: Option<String>,
    /// `Some(None)` clears the stored filter
    pub filter: Option<Option<SearchFilter>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryFrequency {
    pub query: String,
    pub count: u64,
}

/// Aggregates for the statistics view
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SearchStatistics {
    pub total_searches: u64,
    pub unique_queries: u64,
    pub zero_result_searches: u64,
    pub average_result_count: f64,
    pub total_saved_searches: u64,
    pub total_saved_search_uses: u64,
    pub most_used_saved_search: Option<String>,
    pub top_queries: Vec<QueryFrequency>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_validity_requires_two_chars() {
        assert!(!SearchQuery::new("  a ").is_valid());
        assert!(SearchQuery::new(" ab").is_valid());
    }

    #[test]
    fn test_edits_replace_whole_value() {
        let original = SearchQuery::new("emperor");
        let edited = original.clone().with_scope(SearchScope::Key);
        assert_eq!(original.scope, SearchScope::Source);
        assert_eq!(edited.scope, SearchScope::Key);
        assert_eq!(edited.text, "emperor");
    }

    #[test]
    fn test_filter_is_empty() {
        assert!(SearchFilter::default().is_empty());
        let filter = SearchFilter {
            statuses: Some(vec![]),
            ..Default::default()
        };
        assert!(!filter.is_empty());
    }

    #[test]
    fn test_paging_flags() {
        let mut model = SearchResultsModel::empty(SearchQuery::new("emperor"), 50);
        model.total_count = 101;
        model.current_page = 2;
        assert_eq!(model.total_pages(), 3);
        assert!(model.has_previous_page());
        assert!(model.has_next_page());

        model.current_page = 3;
        assert!(!model.has_next_page());
    }

    #[test]
    fn test_matched_field_names() {
        assert_eq!(MatchedField::parse("source_text"), Some(MatchedField::SourceText));
        assert_eq!(MatchedField::TranslatedText.as_str(), "translated_text");
        assert_eq!(MatchedField::parse("bogus"), None);
    }
}
