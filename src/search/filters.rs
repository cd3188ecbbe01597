use super::sql::quote_literal;
use crate::models::{SearchFilter, SearchResult};

/// Column each filter field maps to for one query shape.
/// `None` means the shape has no such column and the field is ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterColumns {
    pub project_id: Option<&'static str>,
    pub language_code: Option<&'static str>,
    pub status: Option<&'static str>,
    pub file_name: Option<&'static str>,
    pub updated_at: Option<&'static str>,
    pub relevance: Option<&'static str>,
}

fn in_list(column: &str, values: &Option<Vec<String>>) -> Option<String> {
    let values = values.as_ref()?;
    if values.is_empty() {
        return None;
    }
    let literals: Vec<String> = values.iter().map(|v| quote_literal(v)).collect();
    Some(format!("{} IN ({})", column, literals.join(", ")))
}

/// Turn a filter into `AND`-able predicates for one query shape
///
/// String values become escaped `IN (...)` lists, date bounds compare epoch
/// milliseconds, and the minimum relevance compares against the shape's
/// relevance expression.
pub fn filter_predicates(filter: Option<&SearchFilter>, columns: &FilterColumns) -> Vec<String> {
    let Some(filter) = filter else {
        return Vec::new();
    };
    let mut predicates = Vec::new();

    if let Some(column) = columns.project_id {
        predicates.extend(in_list(column, &filter.project_ids));
    }
    if let Some(column) = columns.language_code {
        predicates.extend(in_list(column, &filter.language_codes));
    }
    if let Some(column) = columns.status {
        predicates.extend(in_list(column, &filter.statuses));
    }
    if let Some(column) = columns.file_name {
        predicates.extend(in_list(column, &filter.file_names));
    }

    if let Some(column) = columns.updated_at {
        if let Some(from) = filter.date_from {
            predicates.push(format!("{} >= {}", column, from.timestamp_millis()));
        }
        if let Some(to) = filter.date_to {
            predicates.push(format!("{} <= {}", column, to.timestamp_millis()));
        }
    }

    if let (Some(expr), Some(min)) = (columns.relevance, filter.min_relevance) {
        if min.is_finite() {
            predicates.push(format!("{} >= {}", expr, min));
        }
    }

    predicates
}

/// Drop results below the filter's minimum relevance.
/// Used where relevance is not computed in SQL (LIKE / REGEXP / merged results).
pub fn apply_min_relevance(results: Vec<SearchResult>, filter: Option<&SearchFilter>) -> Vec<SearchResult> {
    match filter.and_then(|f| f.min_relevance) {
        Some(min) => results
            .into_iter()
            .filter(|r| r.relevance_score >= min)
            .collect(),
        None => results,
    }
}
