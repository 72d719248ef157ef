//! Named placeholder binder
//!
//! Rewrites named placeholders to the positional form a driver understands
//! and lines up the bind set's values in that order.

use std::collections::HashMap;

use thiserror::Error;

use super::extractor::occurrences;
use super::Parameter;
use crate::{BindSet, DbError, Value};

/// Errors that can occur during parameter binding.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BindError {
    /// A named placeholder has no value in the bind set.
    #[error("missing parameter: {0}")]
    MissingParameter(String),

    /// The statement mixes named and positional placeholders.
    #[error("positional placeholder ${0} cannot be bound by name")]
    PositionalPlaceholder(usize),
}

impl From<BindError> for DbError {
    fn from(err: BindError) -> Self {
        match err {
            BindError::MissingParameter(name) => DbError::MissingParameter(name),
            other => DbError::Query(other.to_string()),
        }
    }
}

/// Result type for parameter binding operations.
pub type BindResult<T> = Result<T, BindError>;

/// Positional placeholder syntax to emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `$1`, `$2` (PostgreSQL)
    DollarNumbered,
    /// `?1`, `?2` (SQLite)
    QuestionNumbered,
}

impl PlaceholderStyle {
    fn render(self, position: usize) -> String {
        match self {
            PlaceholderStyle::DollarNumbered => format!("${}", position),
            PlaceholderStyle::QuestionNumbered => format!("?{}", position),
        }
    }
}

/// A statement rewritten to positional placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    /// SQL with named placeholders replaced by positional ones
    pub sql: String,
    /// Values in positional order
    pub values: Vec<Value>,
}

/// Binds a bind set to a SQL statement with named placeholders.
///
/// A name used several times maps to a single position. Values in the bind
/// set that the statement never references are ignored.
///
/// # Example
///
/// ```
/// use sqlbatch_core::BindSet;
/// use sqlbatch_core::parameters::{PlaceholderStyle, bind_named};
///
/// let binds = BindSet::new().with("id", 42_i64).with("name", "Alice");
/// let bound = bind_named(
///     "SELECT * FROM users WHERE id = :id AND (name = :name OR alias = :name)",
///     &binds,
///     PlaceholderStyle::DollarNumbered,
/// )
/// .unwrap();
///
/// assert_eq!(bound.sql, "SELECT * FROM users WHERE id = $1 AND (name = $2 OR alias = $2)");
/// assert_eq!(bound.values.len(), 2);
/// ```
pub fn bind_named(sql: &str, binds: &BindSet, style: PlaceholderStyle) -> BindResult<BoundStatement> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut values: Vec<Value> = Vec::new();
    let mut rewritten = String::with_capacity(sql.len());
    let mut last_end = 0;

    for occurrence in occurrences(sql) {
        let name = match occurrence.parameter {
            Parameter::Named(name) => name,
            Parameter::Positional(pos) => return Err(BindError::PositionalPlaceholder(pos)),
        };
        let position = match positions.get(&name) {
            Some(&pos) => pos,
            None => {
                let value = binds
                    .get(&name)
                    .ok_or_else(|| BindError::MissingParameter(name.clone()))?;
                values.push(value.clone());
                positions.insert(name, values.len());
                values.len()
            }
        };

        rewritten.push_str(&sql[last_end..occurrence.span.start]);
        rewritten.push_str(&style.render(position));
        last_end = occurrence.span.end;
    }
    rewritten.push_str(&sql[last_end..]);

    Ok(BoundStatement {
        sql: rewritten,
        values,
    })
}
