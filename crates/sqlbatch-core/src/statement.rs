//! SQL statements with named placeholders

use std::sync::Arc;

use crate::parameters::{Parameter, extract_parameters, has_returning_clause};

/// Immutable SQL text. Cloning is cheap; clones share the text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Statement {
    sql: Arc<str>,
}

impl Statement {
    pub fn new(sql: impl Into<Arc<str>>) -> Self {
        Self { sql: sql.into() }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Whether the trimmed text begins with `select`, ignoring case.
    ///
    /// Select statements cannot go through a native batched call, since
    /// such a call returns no rows per bind set.
    pub fn is_select(&self) -> bool {
        starts_with_keyword(&self.sql, "select")
    }

    /// Whether executing the statement yields a row cursor.
    ///
    /// Writes with a `RETURNING` clause count: their rows carry the keys.
    pub fn returns_rows(&self) -> bool {
        ["select", "with", "values", "pragma", "explain", "show", "describe"]
            .iter()
            .any(|kw| starts_with_keyword(&self.sql, kw))
            || has_returning_clause(&self.sql)
    }

    /// Named placeholders in order of first occurrence, without prefixes
    pub fn placeholders(&self) -> Vec<String> {
        extract_parameters(&self.sql)
            .into_iter()
            .filter_map(|p| match p {
                Parameter::Named(name) => Some(name),
                Parameter::Positional(_) => None,
            })
            .collect()
    }

    /// First 100 characters, for log fields
    pub fn preview(&self) -> String {
        self.sql.chars().take(100).collect()
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.sql)
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}

impl From<String> for Statement {
    fn from(sql: String) -> Self {
        Self::new(sql)
    }
}

fn starts_with_keyword(sql: &str, keyword: &str) -> bool {
    let trimmed = sql.trim_start();
    trimmed
        .get(..keyword.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(keyword))
}
