//! Bind normalizer
//!
//! Turns the caller's statement and bind input into one canonical
//! `BatchRequest`. Input shapes are explicit enums, so there is nothing to
//! guess about what a value means.

use sqlbatch_core::{BindSet, Statement, Value};

use crate::error::{BatchError, BatchResult};

/// One statement or an ordered sequence of statements
#[derive(Debug, Clone)]
pub enum Statements {
    One(Statement),
    Many(Vec<Statement>),
}

impl From<Statement> for Statements {
    fn from(statement: Statement) -> Self {
        Statements::One(statement)
    }
}

impl From<&str> for Statements {
    fn from(sql: &str) -> Self {
        Statements::One(Statement::new(sql))
    }
}

impl From<String> for Statements {
    fn from(sql: String) -> Self {
        Statements::One(Statement::new(sql))
    }
}

impl<S: Into<Statement>> From<Vec<S>> for Statements {
    fn from(statements: Vec<S>) -> Self {
        Statements::Many(statements.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<Statement>, const N: usize> From<[S; N]> for Statements {
    fn from(statements: [S; N]) -> Self {
        Statements::Many(statements.into_iter().map(Into::into).collect())
    }
}

/// No bind sets, one bind set, or an ordered sequence of bind sets
#[derive(Debug, Clone, Default)]
pub enum Binds {
    #[default]
    None,
    One(BindSet),
    Many(Vec<BindSet>),
}

impl From<BindSet> for Binds {
    fn from(binds: BindSet) -> Self {
        Binds::One(binds)
    }
}

impl From<Option<BindSet>> for Binds {
    fn from(binds: Option<BindSet>) -> Self {
        binds.map_or(Binds::None, Binds::One)
    }
}

impl From<Vec<BindSet>> for Binds {
    fn from(binds: Vec<BindSet>) -> Self {
        Binds::Many(binds)
    }
}

impl<const N: usize> From<[BindSet; N]> for Binds {
    fn from(binds: [BindSet; N]) -> Self {
        Binds::Many(binds.into())
    }
}

impl From<()> for Binds {
    fn from(_: ()) -> Self {
        Binds::None
    }
}

/// Canonical request: ordered statements and ordered bind sets.
///
/// `binds` is never empty; a lone empty bind set means "no parameters".
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub statements: Vec<Statement>,
    pub binds: Vec<BindSet>,
}

impl BatchRequest {
    /// Whether the request carries no parameters at all
    pub fn is_unparameterized(&self) -> bool {
        matches!(self.binds.as_slice(), [only] if only.is_empty())
    }

    /// Total number of bind values across every bind set
    pub fn bind_value_count(&self) -> usize {
        self.binds.iter().map(BindSet::len).sum()
    }
}

/// Canonicalize caller input.
///
/// Missing binds and an empty bind sequence both become a single empty bind
/// set. An empty statement sequence, or a statement with blank text, is an
/// input-shape error.
pub fn normalize(statements: impl Into<Statements>, binds: impl Into<Binds>) -> BatchResult<BatchRequest> {
    let statements = match statements.into() {
        Statements::One(statement) => vec![statement],
        Statements::Many(statements) => statements,
    };
    if statements.is_empty() {
        return Err(BatchError::InputShape("no statements given".to_string()));
    }
    if let Some(index) = statements.iter().position(|s| s.sql().trim().is_empty()) {
        return Err(BatchError::InputShape(format!("statement {} is empty", index)));
    }

    let binds = match binds.into() {
        Binds::None => vec![BindSet::new()],
        Binds::One(binds) => vec![binds],
        Binds::Many(binds) if binds.is_empty() => vec![BindSet::new()],
        Binds::Many(binds) => binds,
    };

    Ok(BatchRequest { statements, binds })
}

/// Cartesian product of one placeholder's values with existing bind sets.
///
/// Every output is a copy of a `rest` entry extended with `name = value`,
/// ordered by `values` first. An empty `rest` acts as one empty bind set, so
/// products can be nested:
///
/// ```
/// use sqlbatch_engine::bind_product;
///
/// let binds = bind_product(["a.root", "b.root"], "file", bind_product(["T1", "T2"], "site", vec![]));
/// assert_eq!(binds.len(), 4);
/// assert_eq!(binds[1].get("site").and_then(|v| v.as_str()), Some("T2"));
/// assert_eq!(binds[1].get("file").and_then(|v| v.as_str()), Some("a.root"));
/// ```
pub fn bind_product<V, I>(values: I, name: &str, rest: Vec<BindSet>) -> Vec<BindSet>
where
    V: Into<Value>,
    I: IntoIterator<Item = V>,
{
    let rest = if rest.is_empty() { vec![BindSet::new()] } else { rest };
    values
        .into_iter()
        .map(Into::into)
        .flat_map(|value: Value| {
            rest.iter()
                .map(|base| base.clone().with(name, value.clone()))
                .collect::<Vec<_>>()
        })
        .collect()
}
