//! Named bind sets

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::Value;

/// Placeholder name to value mapping for one execution.
///
/// Names are stored without their prefix (`:id` is stored as `id`) and keep
/// insertion order, which is the order used when values are logged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BindSet {
    values: IndexMap<String, Value>,
}

impl BindSet {
    /// Create an empty bind set ("no parameters")
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value, replacing any previous value under the same name
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let name = name.into();
        let name = name
            .strip_prefix([':', '@', '$'])
            .map(str::to_string)
            .unwrap_or(name);
        self.values.insert(name, value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copy of this bind set with every value replaced by a type tag
    pub fn redacted(&self) -> RedactedBindSet {
        RedactedBindSet {
            entries: self
                .values
                .iter()
                .map(|(name, value)| (name.clone(), redact_value(value)))
                .collect(),
        }
    }

    /// Copy of this bind set that shows values verbatim, for local debugging
    pub fn revealed(&self) -> RedactedBindSet {
        RedactedBindSet {
            entries: self
                .values
                .iter()
                .map(|(name, value)| (name.clone(), value.to_string()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for BindSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut binds = BindSet::new();
        for (k, v) in iter {
            binds.insert(k, v);
        }
        binds
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for BindSet {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

fn redact_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) | Value::Decimal(s) => format!("<{}:{}>", value.type_name(), s.len()),
        Value::Bytes(b) => format!("<bytes:{}>", b.len()),
        other => format!("<{}>", other.type_name()),
    }
}

/// Display-safe rendition of a bind set attached to errors and log events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RedactedBindSet {
    entries: IndexMap<String, String>,
}

impl RedactedBindSet {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Display for RedactedBindSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        write!(f, "}}")
    }
}
