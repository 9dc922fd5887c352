//! Bind-parameter and condition values
//!
//! A small tagged union covering everything that can appear as a bound
//! parameter or as a literal recovered from a WHERE clause. The cache
//! never evaluates expressions, so there is no arithmetic here; the type
//! exists to render SQL literals, render row identifiers, and support the
//! partial ordering that range analysis needs.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A scalar or list value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for values range analysis can order: numbers, and strings
    /// (compared lexicographically, which covers ISO dates).
    pub fn is_orderable(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_) | Value::Str(_))
    }

    /// Numeric view across Int and Float, if any.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// SQL-ordering comparison: numeric across Int/Float, lexicographic
    /// for strings, incomparable across kinds. Used by range analysis,
    /// which treats `None` as "cannot prove anything".
    pub fn sql_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }

    /// Render as a SQL literal: strings single-quoted with `'` doubled,
    /// lists parenthesized, NULL for null.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => format!("'{}'", s.replace('\'', "''")),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(|v| v.to_sql_literal()).collect();
                format!("({})", inner.join(","))
            }
        }
    }

    /// Raw rendering without quoting, used for row identifiers and the
    /// human-readable fingerprint form (`10`, `abc`, not `'abc'`).
    pub fn repr(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
            Value::List(items) => items
                .iter()
                .map(|v| v.repr())
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Convert a JSON value arriving over the HTTP boundary.
    pub fn from_json(v: &serde_json::Value) -> Value {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(0.0)),
            },
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(_) => Value::Str(v.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sql_literal())
    }
}

/// Sort a list of values the way `IN (...)` members are canonicalized:
/// numeric ascending when every member is numeric, lexicographic by raw
/// rendering otherwise.
pub fn sort_values(values: &mut [Value]) {
    let all_numeric = values.iter().all(|v| v.as_f64().is_some());
    if all_numeric {
        values.sort_by(|a, b| {
            a.as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal)
        });
    } else {
        values.sort_by_key(|v| v.repr());
    }
}

/// Bound parameters for a statement: positional (`?` or `$N`) or named
/// (`:name`).
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    Positional(Vec<Value>),
    Named(BTreeMap<String, Value>),
}

impl Params {
    pub fn is_empty(&self) -> bool {
        match self {
            Params::Positional(v) => v.is_empty(),
            Params::Named(m) => m.is_empty(),
        }
    }

    /// Convert the `params` field of an HTTP request body: an array maps
    /// to positional parameters, an object to named parameters.
    pub fn from_json(v: &serde_json::Value) -> Option<Params> {
        match v {
            serde_json::Value::Array(items) => Some(Params::Positional(
                items.iter().map(Value::from_json).collect(),
            )),
            serde_json::Value::Object(map) => Some(Params::Named(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            )),
            _ => None,
        }
    }
}
