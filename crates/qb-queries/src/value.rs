//! Rule Values
//!
//! A rule compares its field against a value whose shape depends on the
//! operator: a single scalar, a list (multi operators) or a `{from, to}`
//! range (range operators). Values stay JSON-shaped so that the tree
//! serializes the same way the widget's callers expect.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::QueryOperator;

/// Inclusive range value
///
/// Only objects with exactly `from` and `to` are ranges; anything with extra
/// keys stays a scalar object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValueRange {
    pub from: Value,
    pub to: Value,
}

/// The value a rule compares against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    /// `{ "from": .., "to": .. }`
    Range(ValueRange),
    /// Array of scalars
    List(Vec<Value>),
    /// Any other JSON value, `null` included
    Scalar(Value),
}

/// Coarse shape of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    Single,
    Multi,
    Range,
}

impl RuleValue {
    /// The empty value carried by a freshly added rule
    pub fn null() -> Self {
        Self::Scalar(Value::Null)
    }

    pub fn scalar(value: impl Into<Value>) -> Self {
        Self::Scalar(value.into())
    }

    pub fn list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::List(values.into_iter().map(Into::into).collect())
    }

    pub fn range(from: impl Into<Value>, to: impl Into<Value>) -> Self {
        Self::Range(ValueRange {
            from: from.into(),
            to: to.into(),
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Scalar(Value::Null))
    }

    pub fn shape(&self) -> ValueShape {
        match self {
            Self::Scalar(_) => ValueShape::Single,
            Self::List(_) => ValueShape::Multi,
            Self::Range(_) => ValueShape::Range,
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_range(&self) -> Option<&ValueRange> {
        match self {
            Self::Range(range) => Some(range),
            _ => None,
        }
    }

    /// Whether the shape is the one the operator accepts
    ///
    /// Informational only: the editing contexts never reject a value.
    pub fn fits(&self, operator: &QueryOperator) -> bool {
        match self.shape() {
            ValueShape::Range => operator.is_range,
            ValueShape::Multi => operator.is_multi,
            ValueShape::Single => !operator.is_range && !operator.is_multi,
        }
    }

    /// JSON representation of the value
    pub fn to_json(&self) -> Value {
        match self {
            Self::Scalar(v) => v.clone(),
            Self::List(values) => Value::Array(values.clone()),
            Self::Range(range) => serde_json::json!({ "from": range.from, "to": range.to }),
        }
    }
}

impl Default for RuleValue {
    fn default() -> Self {
        Self::null()
    }
}

impl From<Value> for RuleValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(values) => Self::List(values),
            Value::Object(map) if map.len() == 2 && map.contains_key("from") && map.contains_key("to") => {
                let from = map.get("from").cloned().unwrap_or(Value::Null);
                let to = map.get("to").cloned().unwrap_or(Value::Null);
                Self::Range(ValueRange { from, to })
            }
            other => Self::Scalar(other),
        }
    }
}

impl From<&str> for RuleValue {
    fn from(value: &str) -> Self {
        Self::scalar(value)
    }
}

impl From<String> for RuleValue {
    fn from(value: String) -> Self {
        Self::scalar(value)
    }
}

impl From<i32> for RuleValue {
    fn from(value: i32) -> Self {
        Self::scalar(value)
    }
}

impl From<i64> for RuleValue {
    fn from(value: i64) -> Self {
        Self::scalar(value)
    }
}

impl From<f64> for RuleValue {
    fn from(value: f64) -> Self {
        Self::scalar(value)
    }
}

impl From<bool> for RuleValue {
    fn from(value: bool) -> Self {
        Self::scalar(value)
    }
}
