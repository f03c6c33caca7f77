//! Typed result values returned by the runtime (§6.3).

use std::collections::BTreeMap;
use std::fmt;

/// One cell's value. Histogram columns are plain strings in the compact
/// `"b:c:t:m,..."` form (§3, §6.3) — they are not a distinct `Value`
/// variant, just a `String` that callers may choose to parse with
/// [`crate::histogram`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Text(String),
    Null,
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Null => write!(f, ""),
        }
    }
}

/// One row, keyed by column name in builder order (duplicated into a
/// `BTreeMap` for convenient by-name lookup from peek providers; the
/// [`ResultSet::columns`] vector is the authoritative ordering).
pub type Row = BTreeMap<String, Value>;

/// Result of executing a composed query (§6.3).
#[derive(Debug, Clone)]
pub struct ResultSet {
    /// Column names, in builder order.
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub elapsed_s: f64,
}

impl ResultSet {
    pub fn empty() -> Self {
        ResultSet {
            columns: Vec::new(),
            rows: Vec::new(),
            elapsed_s: 0.0,
        }
    }
}
