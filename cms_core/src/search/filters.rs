use lazy_static::lazy_static;
use regex::Regex;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};

lazy_static! {
    static ref OPERATOR_REGEX: Regex = Regex::new(r"(?s)^(?:\s*(<>|<=|>=|<|>|=))?(.*)$").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
}

/// Conditions built from a filter template, joined with `AND`.
#[derive(Debug, Clone, Default)]
pub struct Criteria {
    conditions: Vec<String>,
    params: Vec<SqlValue>,
}

/// Splits an optional leading comparison operator off a filter value.
pub fn split_operator(value: &str) -> (&str, &str) {
    match OPERATOR_REGEX.captures(value) {
        Some(caps) => (
            caps.get(1).map_or("", |m| m.as_str()),
            caps.get(2).map_or("", |m| m.as_str()),
        ),
        None => ("", value),
    }
}

/// Case-insensitive pattern matching `value` literally anywhere in a column.
/// Case folding is Unicode-aware, unlike SQLite's `LIKE`.
pub fn contains_pattern(value: &str) -> String {
    format!("(?i){}", regex::escape(value))
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partial, case-insensitive match unless the value starts with an operator.
    /// Needs the `REGEXP` function registered on the connection.
    pub fn compare(self, column: &'static str, value: Option<&str>) -> Self {
        self.compare_text(column, value, true)
    }

    /// Exact match: `=` unless the value starts with an operator.
    pub fn compare_exact(self, column: &'static str, value: Option<&str>) -> Self {
        self.compare_text(column, value, false)
    }

    pub fn compare_id(mut self, column: &'static str, value: Option<i64>) -> Self {
        if let Some(id) = value {
            self.conditions.push(format!("{} = ?", column));
            self.params.push(SqlValue::Integer(id));
        }
        self
    }

    fn compare_text(mut self, column: &'static str, value: Option<&str>, partial: bool) -> Self {
        let Some(value) = value else {
            return self;
        };

        let (op, operand) = split_operator(value);
        if operand.is_empty() {
            return self;
        }

        if partial && (op.is_empty() || op == "<>") {
            let condition = if op.is_empty() {
                format!("{} REGEXP ?", column)
            } else {
                format!("NOT ({} REGEXP ?)", column)
            };
            self.conditions.push(condition);
            self.params.push(SqlValue::Text(contains_pattern(operand)));
        } else {
            let op = if op.is_empty() { "=" } else { op };
            self.conditions.push(format!("{} {} ?", column, op));
            self.params.push(SqlValue::Text(operand.to_string()));
        }

        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn bind_to<'q>(
        &self,
        mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        for param in &self.params {
            query = match param {
                SqlValue::Text(text) => query.bind(text.clone()),
                SqlValue::Integer(number) => query.bind(*number),
            };
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_criteria() {
        let criteria = Criteria::new().compare("name", None).compare("email", Some(""));
        assert!(criteria.is_empty());
        assert!(criteria.where_clause().is_empty());
        assert!(criteria.params().is_empty());
    }

    #[test]
    fn test_partial_match_uses_case_insensitive_regexp() {
        let criteria = Criteria::new().compare("name", Some("report"));
        assert_eq!(criteria.where_clause(), "WHERE name REGEXP ?");
        assert_eq!(criteria.params(), &[SqlValue::Text("(?i)report".to_string())]);
    }

    #[test]
    fn test_operators() {
        let criteria = Criteria::new()
            .compare("name", Some("<>draft"))
            .compare("size", Some(">=100"))
            .compare_exact("type", Some("application/pdf"));

        assert_eq!(
            criteria.where_clause(),
            "WHERE NOT (name REGEXP ?) AND size >= ? AND type = ?"
        );
        assert_eq!(
            criteria.params(),
            &[
                SqlValue::Text("(?i)draft".to_string()),
                SqlValue::Text("100".to_string()),
                SqlValue::Text("application/pdf".to_string()),
            ]
        );
    }

    #[test]
    fn test_operator_without_operand_adds_nothing() {
        let criteria = Criteria::new().compare("name", Some("<>")).compare("size", Some(" >="));
        assert!(criteria.is_empty());
    }

    #[test]
    fn test_id_columns() {
        let criteria = Criteria::new().compare_id("id", Some(3)).compare_id("user_id", None);
        assert_eq!(criteria.where_clause(), "WHERE id = ?");
        assert_eq!(criteria.params(), &[SqlValue::Integer(3)]);
    }

    #[test]
    fn test_split_operator() {
        assert_eq!(split_operator("abc"), ("", "abc"));
        assert_eq!(split_operator("  <= 5"), ("<=", " 5"));
        assert_eq!(split_operator("=x"), ("=", "x"));
        assert_eq!(split_operator(" plain"), ("", " plain"));
    }

    #[test]
    fn test_contains_pattern_is_literal() {
        assert_eq!(contains_pattern("a.pdf (v2)"), "(?i)a\\.pdf \\(v2\\)");
        let pattern = Regex::new(&contains_pattern("résumé")).unwrap();
        assert!(pattern.is_match("My RÉSUMÉ.pdf"));
        assert!(!Regex::new(&contains_pattern("100%")).unwrap().is_match("1000"));
    }
}
