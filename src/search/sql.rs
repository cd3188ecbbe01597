//! Typed intermediate for generated SELECT statements
//!
//! Builders describe a query as table + joins + predicates + ordering and
//! render it to SQL in one place.

use crate::storage::Value;

/// Upper bound for LIMIT
pub const MAX_LIMIT: usize = 1000;
/// Upper bound for OFFSET
pub const MAX_OFFSET: usize = 1_000_000;

/// Clamp a requested limit into `[1, max]`
pub fn clamp_limit(limit: i64, max: usize) -> usize {
    let max = max.clamp(1, MAX_LIMIT);
    if limit < 1 {
        1
    } else {
        (limit as u64).min(max as u64) as usize
    }
}

/// Clamp a requested offset into `[0, max]`
pub fn clamp_offset(offset: i64, max: usize) -> usize {
    let max = max.min(MAX_OFFSET);
    if offset < 0 {
        0
    } else {
        (offset as u64).min(max as u64) as usize
    }
}

/// Escape a value for use inside a single-quoted SQL string literal.
/// Only for filter values; free text goes through the sanitizer instead.
pub fn escape_sql_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// `'value'` with embedded quotes doubled
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", escape_sql_literal(value))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub alias: String,
    pub on: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectQuery {
    columns: Vec<String>,
    from: String,
    joins: Vec<Join>,
    predicates: Vec<String>,
    order_by: Vec<String>,
    limit: Option<usize>,
    offset: Option<usize>,
    params: Vec<Value>,
}

impl SelectQuery {
    pub fn from(table: &str) -> Self {
        Self {
            from: table.to_string(),
            ..Default::default()
        }
    }

    /// Select from `(part UNION ALL part ...) alias`. Parts share the outer
    /// query's bound parameters, so they must not carry their own.
    pub fn from_union_all(parts: &[SelectQuery], alias: &str) -> Self {
        let rendered: Vec<String> = parts.iter().map(SelectQuery::render).collect();
        Self::from(&format!("({}) {}", rendered.join(" UNION ALL "), alias))
    }

    /// Add `expr AS alias`
    pub fn column(mut self, expr: &str, alias: &str) -> Self {
        self.columns.push(format!("{} AS {}", expr, alias));
        self
    }

    pub fn join(mut self, kind: JoinKind, table: &str, alias: &str, on: &str) -> Self {
        self.joins.push(Join {
            kind,
            table: table.to_string(),
            alias: alias.to_string(),
            on: on.to_string(),
        });
        self
    }

    pub fn predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicates.push(predicate.into());
        self
    }

    pub fn predicates(mut self, predicates: impl IntoIterator<Item = String>) -> Self {
        self.predicates.extend(predicates);
        self
    }

    pub fn order_by(mut self, clause: &str) -> Self {
        self.order_by.push(clause.to_string());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn param(mut self, value: Value) -> Self {
        self.params.push(value);
        self
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    fn render_body(&self, sql: &mut String) {
        sql.push_str(" FROM ");
        sql.push_str(&self.from);
        for join in &self.joins {
            let keyword = match join.kind {
                JoinKind::Inner => "INNER JOIN",
                JoinKind::Left => "LEFT JOIN",
            };
            sql.push_str(&format!(" {} {} {} ON {}", keyword, join.table, join.alias, join.on));
        }
        if !self.predicates.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.predicates.join(" AND "));
        }
    }

    pub fn render(&self) -> String {
        let mut sql = String::from("SELECT ");
        sql.push_str(&self.columns.join(", "));
        self.render_body(&mut sql);
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
            if let Some(offset) = self.offset {
                sql.push_str(&format!(" OFFSET {}", offset));
            }
        }
        sql
    }

    /// Same FROM/JOIN/WHERE, counting rows instead of selecting a page
    pub fn render_count(&self) -> String {
        let mut sql = String::from("SELECT COUNT(*) AS total");
        self.render_body(&mut sql);
        sql
    }

    pub fn build(&self) -> BuiltQuery {
        BuiltQuery {
            sql: self.render(),
            params: self.params.clone(),
        }
    }

    pub fn build_count(&self) -> BuiltQuery {
        BuiltQuery {
            sql: self.render_count(),
            params: self.params.clone(),
        }
    }
}

/// Rendered SQL plus any bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_clamping() {
        assert_eq!(clamp_limit(5000, MAX_LIMIT), 1000);
        assert_eq!(clamp_limit(0, MAX_LIMIT), 1);
        assert_eq!(clamp_limit(-7, MAX_LIMIT), 1);
        assert_eq!(clamp_limit(50, MAX_LIMIT), 50);
        assert_eq!(clamp_limit(500, 100), 100);
    }

    #[test]
    fn test_offset_clamping() {
        assert_eq!(clamp_offset(-1, MAX_OFFSET), 0);
        assert_eq!(clamp_offset(2_000_000, MAX_OFFSET), 1_000_000);
        assert_eq!(clamp_offset(40, MAX_OFFSET), 40);
    }

    #[test]
    fn test_literal_escaping() {
        assert_eq!(escape_sql_literal("O'Brien"), "O''Brien");
        assert_eq!(quote_literal("it's"), "'it''s'");
        assert_eq!(quote_literal("plain"), "'plain'");
    }

    #[test]
    fn test_union_all_source() {
        let a = SelectQuery::from("a").column("a.id", "id").predicate("a.x = ?1");
        let b = SelectQuery::from("b").column("b.id", "id").predicate("b.y = ?1");
        let query = SelectQuery::from_union_all(&[a, b], "hits")
            .column("hits.id", "id")
            .order_by("hits.id ASC")
            .limit(5)
            .offset(0);

        assert_eq!(
            query.render(),
            "SELECT hits.id AS id FROM (SELECT a.id AS id FROM a WHERE a.x = ?1 UNION ALL \
             SELECT b.id AS id FROM b WHERE b.y = ?1) hits ORDER BY hits.id ASC LIMIT 5 OFFSET 0"
        );
        assert!(query
            .render_count()
            .starts_with("SELECT COUNT(*) AS total FROM (SELECT a.id AS id FROM a"));
    }

    #[test]
    fn test_render_full_select() {
        let query = SelectQuery::from("items i")
            .column("i.id", "id")
            .column("p.name", "project_name")
            .join(JoinKind::Left, "projects", "p", "p.id = i.project_id")
            .predicate("i.kind = 'a'")
            .predicate("i.size > 3")
            .order_by("i.id DESC")
            .limit(10)
            .offset(20);

        assert_eq!(
            query.render(),
            "SELECT i.id AS id, p.name AS project_name FROM items i \
             LEFT JOIN projects p ON p.id = i.project_id \
             WHERE i.kind = 'a' AND i.size > 3 ORDER BY i.id DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(
            query.render_count(),
            "SELECT COUNT(*) AS total FROM items i \
             LEFT JOIN projects p ON p.id = i.project_id \
             WHERE i.kind = 'a' AND i.size > 3"
        );
    }
}
