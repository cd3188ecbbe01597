//! Search functionality
//!
//! This module provides search capabilities:
//! - Query sanitization against SQL / FTS5 injection
//! - FTS5 query construction for units, versions and translation memory
//! - LIKE-based glossary search and REGEXP fallback search
//! - Result mapping with highlighting and context snippets
//! - Search history and saved searches

mod executor;
mod filters;
mod fts_builder;
mod history;
mod mapper;
mod query_parser;
mod regex_builder;
mod sanitizer;
mod sql;

pub use executor::{SearchService, REGEX_HISTORY_PREFIX};
pub use filters::{apply_min_relevance, filter_predicates, FilterColumns};
pub use fts_builder::{like_pattern, BuildOptions, FtsQueryBuilder, MEMORY_FTS, UNITS_FTS, VERSIONS_FTS};
pub use history::{HistoryManager, DEFAULT_HISTORY_CAP};
pub use query_parser::{build_fts_expression, parse_simple_query, with_column_filter, ParsedQuery};
pub use regex_builder::{pattern_for_options, validate_and_escape, validate_pattern, RegexQueryBuilder};
pub use sanitizer::{detect_injection, sanitize, validate_fts_query, MAX_QUERY_LENGTH};
pub use sql::{clamp_limit, clamp_offset, escape_sql_literal, quote_literal, BuiltQuery, SelectQuery, MAX_LIMIT, MAX_OFFSET};

use regex::Regex;

/// A match location in characters: (start, length)
pub type CharSpan = (usize, usize);

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Find `needle` in `text` ignoring case, returning a char-based span
pub fn find_case_insensitive(text: &str, needle: &str) -> Option<CharSpan> {
    let hay: Vec<char> = text.chars().collect();
    let pin: Vec<char> = needle.chars().collect();
    if pin.is_empty() || pin.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - pin.len())
        .find(|&start| {
            hay[start..start + pin.len()]
                .iter()
                .zip(&pin)
                .all(|(a, b)| chars_eq_ignore_case(*a, *b))
        })
        .map(|start| (start, pin.len()))
}

/// Every case-insensitive occurrence of any term, merged and sorted
fn term_spans(text: &str, terms: &[String]) -> Vec<CharSpan> {
    let hay: Vec<char> = text.chars().collect();
    let mut spans = Vec::new();
    for term in terms {
        let pin: Vec<char> = term.chars().collect();
        if pin.is_empty() || pin.len() > hay.len() {
            continue;
        }
        let mut start = 0;
        while start + pin.len() <= hay.len() {
            let hit = hay[start..start + pin.len()]
                .iter()
                .zip(&pin)
                .all(|(a, b)| chars_eq_ignore_case(*a, *b));
            if hit {
                spans.push((start, pin.len()));
                start += pin.len();
            } else {
                start += 1;
            }
        }
    }
    merge_spans(spans)
}

fn regex_spans(text: &str, regex: &Regex) -> Vec<CharSpan> {
    let spans = regex
        .find_iter(text)
        .filter(|m| !m.is_empty())
        .map(|m| {
            let start = text[..m.start()].chars().count();
            (start, m.as_str().chars().count())
        })
        .collect();
    merge_spans(spans)
}

fn merge_spans(mut spans: Vec<CharSpan>) -> Vec<CharSpan> {
    spans.sort_unstable();
    let mut merged: Vec<CharSpan> = Vec::with_capacity(spans.len());
    for (start, len) in spans {
        if let Some(last) = merged.last_mut() {
            let last_end = last.0 + last.1;
            if start <= last_end {
                last.1 = last_end.max(start + len) - last.0;
                continue;
            }
        }
        merged.push((start, len));
    }
    merged
}

fn wrap_spans(text: &str, spans: &[CharSpan]) -> String {
    if spans.is_empty() {
        return text.to_string();
    }
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + spans.len() * 13);
    let mut cursor = 0;
    for &(start, len) in spans {
        out.extend(&chars[cursor..start]);
        out.push_str("<mark>");
        out.extend(&chars[start..start + len]);
        out.push_str("</mark>");
        cursor = start + len;
    }
    out.extend(&chars[cursor..]);
    out
}

/// Wrap every case-insensitive occurrence of the terms in `<mark>` tags
pub fn highlight_terms(text: &str, terms: &[String]) -> String {
    wrap_spans(text, &term_spans(text, terms))
}

/// Wrap every regex match in `<mark>` tags
pub fn highlight_regex(text: &str, regex: &Regex) -> String {
    wrap_spans(text, &regex_spans(text, regex))
}

/// First regex match as a char span
pub fn find_regex(text: &str, regex: &Regex) -> Option<CharSpan> {
    regex_spans(text, regex).into_iter().next()
}

/// Extract a window of about `width` characters around a match
///
/// The characters left over after the match are split before/after it, and
/// an ellipsis marks each truncated side. Without a match the snippet is
/// the first `width` characters.
pub fn context_snippet(text: &str, span: Option<CharSpan>, width: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();

    let (start, end) = match span {
        Some((match_start, match_len)) if match_start + match_len <= total => {
            let remaining = width.saturating_sub(match_len);
            let before = remaining / 2;
            let after = remaining - before;
            (
                match_start.saturating_sub(before),
                (match_start + match_len + after).min(total),
            )
        }
        _ => (0, width.min(total)),
    };

    let mut snippet = String::new();
    if start > 0 {
        snippet.push_str("...");
    }
    snippet.extend(&chars[start..end]);
    if end < total {
        snippet.push_str("...");
    }
    snippet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_case_insensitive() {
        assert_eq!(find_case_insensitive("The Emperor rides", "emperor"), Some((4, 7)));
        assert_eq!(find_case_insensitive("Über alles", "über"), Some((0, 4)));
        assert_eq!(find_case_insensitive("short", "much longer needle"), None);
        assert_eq!(find_case_insensitive("anything", ""), None);
    }

    #[test]
    fn test_highlight_terms_merges_overlaps() {
        let terms = vec!["emp".to_string(), "emperor".to_string()];
        assert_eq!(
            highlight_terms("The Emperor and the emp", &terms),
            "The <mark>Emperor</mark> and the <mark>emp</mark>"
        );
    }

    #[test]
    fn test_highlight_regex() {
        let regex = Regex::new("(?i)gu[a-z]+d").unwrap();
        assert_eq!(
            highlight_regex("Imperial Guard, guarded", &regex),
            "Imperial <mark>Guard</mark>, <mark>guarded</mark>"
        );
    }

    #[test]
    fn test_snippet_window_with_ellipsis() {
        let text = format!("{}emperor{}", "a".repeat(60), "b".repeat(60));
        let span = find_case_insensitive(&text, "EMPEROR");
        let snippet = context_snippet(&text, span, 50);

        assert!(snippet.starts_with("..."));
        assert!(snippet.ends_with("..."));
        assert!(snippet.contains("emperor"));
        // 50 characters of window plus two ellipses
        assert_eq!(snippet.chars().count(), 56);
    }

    #[test]
    fn test_snippet_short_text_untouched() {
        let span = find_case_insensitive("The emperor", "emperor");
        assert_eq!(context_snippet("The emperor", span, 50), "The emperor");
    }

    #[test]
    fn test_snippet_falls_back_to_prefix() {
        let text = "x".repeat(80);
        let snippet = context_snippet(&text, None, 50);
        assert_eq!(snippet, format!("{}...", "x".repeat(50)));
    }

    #[test]
    fn test_snippet_respects_multibyte_chars() {
        let text = format!("{}皇帝{}", "日".repeat(40), "本".repeat(40));
        let span = find_case_insensitive(&text, "皇帝");
        let snippet = context_snippet(&text, span, 10);
        assert_eq!(snippet, format!("...{}皇帝{}...", "日".repeat(4), "本".repeat(4)));
    }
}
