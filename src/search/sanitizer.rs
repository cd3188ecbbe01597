//! Free-text sanitization for FTS5 MATCH expressions
//!
//! MATCH values are interpolated into the SQL text, so every user query
//! goes through [`sanitize`] before any builder sees it. [`validate_fts_query`]
//! is a separate structural check on the raw input; both must pass.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{FtsSyntaxError, InjectionKind, SanitizeError};

/// Longest accepted query, in characters, after trimming
pub const MAX_QUERY_LENGTH: usize = 500;

const FTS_OPERATORS: [&str; 3] = ["AND", "OR", "NOT"];

fn blocklist() -> &'static [(InjectionKind, Regex)] {
    static BLOCKLIST: OnceLock<Vec<(InjectionKind, Regex)>> = OnceLock::new();
    BLOCKLIST.get_or_init(|| {
        [
            (
                InjectionKind::Keyword,
                r"(?i)\b(DROP|DELETE|UPDATE|INSERT|ALTER|CREATE|EXEC|EXECUTE)\b",
            ),
            (InjectionKind::Comment, r"--|/\*|\*/"),
            (InjectionKind::StatementTerminator, r";"),
            (
                InjectionKind::Tautology,
                r#"(?i)\b(OR|AND)\s+['"]?\d+['"]?\s*=\s*['"]?\d+"#,
            ),
            (InjectionKind::Union, r"(?i)\bUNION\b"),
            (
                InjectionKind::FileFunction,
                r"(?i)\b(LOAD_FILE|INTO\s+OUTFILE|INTO\s+DUMPFILE)\b",
            ),
        ]
        .into_iter()
        .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("blocklist pattern is valid")))
        .collect()
    })
}

/// Return the first blocklisted signature found in `input`
pub fn detect_injection(input: &str) -> Option<InjectionKind> {
    if input.contains('\0') {
        return Some(InjectionKind::NullByte);
    }
    blocklist()
        .iter()
        .find(|(_, regex)| regex.is_match(input))
        .map(|(kind, _)| *kind)
}

#[inline]
fn is_allowed(c: char) -> bool {
    c.is_alphanumeric() || c.is_whitespace() || matches!(c, '-' | '_' | '.' | '"' | '\'')
}

/// Sanitize a raw user query for use inside a MATCH literal
///
/// Rejects blank, oversized and injection-shaped input. On success quotes
/// are doubled and every run of characters outside the allow-set collapses
/// to a single space.
pub fn sanitize(raw: &str) -> Result<String, SanitizeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SanitizeError::Empty);
    }

    let len = trimmed.chars().count();
    if len > MAX_QUERY_LENGTH {
        return Err(SanitizeError::TooLong {
            len,
            max: MAX_QUERY_LENGTH,
        });
    }

    if let Some(kind) = detect_injection(trimmed) {
        log::warn!("[Sanitizer] Rejected query ({:?})", kind);
        return Err(SanitizeError::Rejected(kind));
    }

    let escaped = trimmed.replace('"', "\"\"").replace('\'', "''");

    let mut cleaned = String::with_capacity(escaped.len());
    let mut in_disallowed_run = false;
    for c in escaped.chars() {
        if is_allowed(c) {
            cleaned.push(c);
            in_disallowed_run = false;
        } else if !in_disallowed_run {
            cleaned.push(' ');
            in_disallowed_run = true;
        }
    }

    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Err(SanitizeError::Empty);
    }
    Ok(cleaned.to_string())
}

/// Structural check for FTS operator syntax, run on the raw and the sanitized query
///
/// Catches unbalanced quotes or parentheses and operators with a missing
/// operand before any SQL is built.
pub fn validate_fts_query(query: &str) -> Result<(), FtsSyntaxError> {
    if query.chars().filter(|&c| c == '"').count() % 2 != 0 {
        return Err(FtsSyntaxError::UnbalancedQuotes);
    }

    let mut depth: i32 = 0;
    for c in query.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(FtsSyntaxError::UnbalancedParens);
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(FtsSyntaxError::UnbalancedParens);
    }

    let tokens: Vec<&str> = query
        .split(|c: char| c.is_whitespace() || c == '(' || c == ')')
        .filter(|t| !t.is_empty())
        .collect();
    let is_operator = |t: &str| FTS_OPERATORS.contains(&t);

    for (i, token) in tokens.iter().enumerate() {
        if !is_operator(token) {
            continue;
        }
        let first = i == 0;
        let last = i + 1 == tokens.len();
        let followed_by_operator = tokens.get(i + 1).is_some_and(|next| is_operator(next));
        if first || last || followed_by_operator {
            return Err(FtsSyntaxError::DanglingOperator(token.to_string()));
        }
    }

    Ok(())
}
