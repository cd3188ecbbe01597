use crate::models::{SearchOperator, SearchOptions};

/// One whitespace-separated piece of a sanitized query
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Operator(&'a str),
    Term(&'a str),
}

/// Plain terms pulled from a user query, used for highlighting and snippets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    pub terms: Vec<String>,          // terms a hit is expected to contain
    pub excluded_terms: Vec<String>, // NOT terms (must not match)
}

fn tokenize(sanitized: &str) -> Vec<Token<'_>> {
    sanitized
        .split_whitespace()
        .map(|part| match part {
            "AND" | "OR" | "NOT" => Token::Operator(part),
            _ => Token::Term(part),
        })
        .collect()
}

/// Characters FTS5 accepts in a bareword
#[inline]
fn is_bareword(term: &str) -> bool {
    term.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || !c.is_ascii())
}

/// Render one term: barewords stay as-is, anything else becomes a quoted
/// phrase. Quotes inside the term were already doubled by the sanitizer,
/// which is exactly the escaping FTS5 expects inside a phrase.
fn render_term(term: &str, prefix: bool) -> String {
    let rendered = if is_bareword(term) {
        term.to_string()
    } else {
        format!("\"{}\"", term)
    };
    if prefix {
        format!("{}*", rendered)
    } else {
        rendered
    }
}

/// Build the FTS5 expression for a sanitized query
///
/// - `phrase_search` quotes the whole text as one phrase
/// - explicit uppercase `AND`/`OR`/`NOT` in the text are kept as written
/// - otherwise terms are joined with `operator` (`Not` keeps the first term
///   and excludes each following one)
/// - `prefix_search` appends `*` to every term
pub fn build_fts_expression(sanitized: &str, operator: SearchOperator, options: &SearchOptions) -> String {
    if options.phrase_search {
        let phrase = format!("\"{}\"", sanitized);
        return if options.prefix_search {
            format!("{}*", phrase)
        } else {
            phrase
        };
    }

    let tokens = tokenize(sanitized);
    let explicit = tokens.iter().any(|t| matches!(t, Token::Operator(_)));

    if explicit {
        return tokens
            .iter()
            .map(|t| match t {
                Token::Operator(op) => op.to_string(),
                Token::Term(term) => render_term(term, options.prefix_search),
            })
            .collect::<Vec<_>>()
            .join(" ");
    }

    let terms: Vec<String> = tokens
        .iter()
        .filter_map(|t| match t {
            Token::Term(term) => Some(render_term(term, options.prefix_search)),
            Token::Operator(_) => None,
        })
        .collect();

    let separator = match operator {
        SearchOperator::And => " AND ",
        SearchOperator::Or => " OR ",
        SearchOperator::Not => " NOT ",
    };
    terms.join(separator)
}

/// Restrict an FTS expression to a set of columns
pub fn with_column_filter(expression: &str, columns: &[&str]) -> String {
    format!("{{{}}} : ({})", columns.join(" "), expression)
}

/// Pull plain terms out of a raw (unsanitized) query
///
/// Supports:
/// - AND / OR between terms (both kept as highlight terms)
/// - NOT term (excluded)
/// - Exact phrase: `"hello world"` (kept as one term)
pub fn parse_simple_query(query: &str) -> ParsedQuery {
    let mut parsed = ParsedQuery::default();

    let mut remaining = String::new();
    for (i, segment) in query.split('"').enumerate() {
        // Odd segments sit between quotes
        if i % 2 == 1 {
            let phrase = segment.trim();
            if !phrase.is_empty() {
                parsed.terms.push(phrase.to_lowercase());
            }
        } else {
            remaining.push(' ');
            remaining.push_str(segment);
        }
    }

    let parts: Vec<&str> = remaining.split_whitespace().collect();
    let mut i = 0;
    while i < parts.len() {
        let part = parts[i];
        if part == "AND" || part == "OR" {
            i += 1;
            continue;
        }
        if part == "NOT" {
            if let Some(next) = parts.get(i + 1) {
                let term = clean_term(next);
                if !term.is_empty() {
                    parsed.excluded_terms.push(term);
                }
            }
            i += 2;
            continue;
        }
        let term = clean_term(part);
        if !term.is_empty() {
            parsed.terms.push(term);
        }
        i += 1;
    }

    parsed
}

fn clean_term(term: &str) -> String {
    term.trim_matches(|c: char| !c.is_alphanumeric() && c != '_' && c != '-')
        .to_lowercase()
}
