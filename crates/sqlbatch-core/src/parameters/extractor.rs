//! Placeholder extractor
//!
//! Scans SQL text for placeholders, ignoring string literals, quoted
//! identifiers and comments.

use regex::Regex;
use std::collections::HashSet;
use std::ops::Range;
use std::sync::LazyLock;

/// A placeholder found in SQL text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Parameter {
    /// A named placeholder like `:name`, `@name`, or `$name`, stored without prefix.
    Named(String),
    /// A positional placeholder like `$1` or `?`.
    Positional(usize),
}

impl Parameter {
    /// Returns the parameter name if this is a named parameter.
    pub fn name(&self) -> Option<&str> {
        match self {
            Parameter::Named(name) => Some(name),
            Parameter::Positional(_) => None,
        }
    }

    /// Returns true if this is a named parameter.
    pub fn is_named(&self) -> bool {
        matches!(self, Parameter::Named(_))
    }
}

/// The placeholder style detected in the SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterStyle {
    /// `:name`
    ColonNamed,
    /// `@name`
    AtNamed,
    /// `$name`
    DollarNamed,
    /// `$1`, `$2`
    DollarPositional,
    /// `?`
    QuestionMark,
    /// More than one of the above
    Mixed,
}

/// Placeholders in order of first occurrence plus the detected style.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub parameters: Vec<Parameter>,
    pub style: Option<ParameterStyle>,
}

/// One placeholder occurrence with its byte span in the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Occurrence {
    pub span: Range<usize>,
    pub parameter: Parameter,
    pub style: ParameterStyle,
}

static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<prefix>[:@$])(?P<name>[A-Za-z_][A-Za-z0-9_]*)|\$(?P<pos>\d+)|\?")
        .expect("valid regex")
});

// String literals, quoted identifiers, line comments and block comments
static SKIP_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"'(?:[^']|'')*'|"(?:[^"]|"")*"|--[^\n]*|/\*[\s\S]*?\*/"#).expect("valid regex")
});

static RETURNING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\breturning\b").expect("valid regex"));

/// Whether `sql` has a `RETURNING` clause outside literals and comments.
pub(crate) fn has_returning_clause(sql: &str) -> bool {
    let skipped: Vec<Range<usize>> = SKIP_REGEX.find_iter(sql).map(|m| m.range()).collect();
    RETURNING_REGEX
        .find_iter(sql)
        .any(|m| !skipped.iter().any(|r| r.contains(&m.start())))
}

/// Extracts the unique placeholders of a SQL string, in order of first occurrence.
///
/// # Example
///
/// ```
/// use sqlbatch_core::parameters::{extract_parameters, Parameter};
///
/// let params = extract_parameters("SELECT * FROM users WHERE id = :id AND name = :name");
/// assert_eq!(params, vec![Parameter::Named("id".into()), Parameter::Named("name".into())]);
/// ```
pub fn extract_parameters(sql: &str) -> Vec<Parameter> {
    extract_parameters_with_style(sql).parameters
}

/// Like `extract_parameters`, but also reports the placeholder style.
pub fn extract_parameters_with_style(sql: &str) -> ExtractionResult {
    let mut parameters = Vec::new();
    let mut seen = HashSet::new();
    let mut styles: Vec<ParameterStyle> = Vec::new();

    for occurrence in occurrences(sql) {
        if !styles.contains(&occurrence.style) {
            styles.push(occurrence.style);
        }
        if seen.insert(occurrence.parameter.clone()) {
            parameters.push(occurrence.parameter);
        }
    }

    let style = match styles.as_slice() {
        [] => None,
        [single] => Some(*single),
        _ => Some(ParameterStyle::Mixed),
    };

    ExtractionResult { parameters, style }
}

/// Every placeholder occurrence, in text order.
///
/// `::` casts and `@@` system variables are not placeholders. Each `?` gets
/// the next position number.
pub(crate) fn occurrences(sql: &str) -> Vec<Occurrence> {
    let skipped: Vec<Range<usize>> = SKIP_REGEX.find_iter(sql).map(|m| m.range()).collect();
    let in_skipped = |pos: usize| skipped.iter().any(|r| r.contains(&pos));
    let bytes = sql.as_bytes();

    let mut found = Vec::new();
    let mut question_marks = 0;
    for cap in PLACEHOLDER_REGEX.captures_iter(sql) {
        let Some(full) = cap.get(0) else { continue };
        if in_skipped(full.start()) {
            continue;
        }
        let preceding = full.start().checked_sub(1).map(|i| bytes[i]);

        let (parameter, style) = if let (Some(prefix), Some(name)) = (cap.name("prefix"), cap.name("name")) {
            let prefix = prefix.as_str();
            if preceding.is_some_and(|b| b == prefix.as_bytes()[0]) {
                continue;
            }
            let style = match prefix {
                ":" => ParameterStyle::ColonNamed,
                "@" => ParameterStyle::AtNamed,
                _ => ParameterStyle::DollarNamed,
            };
            (Parameter::Named(name.as_str().to_string()), style)
        } else if let Some(pos) = cap.name("pos") {
            let Ok(position) = pos.as_str().parse::<usize>() else { continue };
            (Parameter::Positional(position), ParameterStyle::DollarPositional)
        } else {
            question_marks += 1;
            (Parameter::Positional(question_marks), ParameterStyle::QuestionMark)
        };

        found.push(Occurrence {
            span: full.range(),
            parameter,
            style,
        });
    }
    found
}
