use std::collections::BTreeMap;
use std::fmt;

use derive_more::From;
use serde::{Deserialize, Serialize};

/// Dynamic value used throughout the library: parameter defaults, rule rollout values, constraint
/// operands, attribute values, and experiment variant values are all `Value`s.
///
/// Conveniently implements `From` conversions for `bool`, `i64`, `f64`, `String`, and `&str`.
///
/// Examples:
/// ```
/// # use polaris::Value;
/// let string_value: Value = "example".into();
/// let int_value: Value = 42.into();
/// let float_value: Value = 0.5.into();
/// let bool_value: Value = true.into();
/// ```
#[derive(Debug, Serialize, Deserialize, PartialEq, From, Clone, Default)]
#[serde(untagged)]
pub enum Value {
    /// A null value or absence of value.
    #[default]
    #[from(ignore)]
    Null,
    /// A boolean value.
    Bool(bool),
    /// A 64-bit signed integer value.
    ///
    /// Kept separate from [`Value::Float`] so that whole numbers survive a deserialize/serialize
    /// round trip unchanged. Comparison operators treat both variants as numeric.
    Int(i64),
    /// A 64-bit floating-point value.
    Float(f64),
    /// A string value.
    String(String),
    /// An ordered sequence of values.
    Seq(Vec<Value>),
    /// A mapping from string keys to values.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns `true` if the value is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the value as a boolean if it is of type [`Value::Bool`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as an integer if it is of type [`Value::Int`].
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a float if it is of type [`Value::Float`].
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the value as an `f64` if it is numeric (either [`Value::Int`] or [`Value::Float`]).
    ///
    /// Integers above 2^53 lose precision in the conversion; comparison semantics accept this the
    /// same way the wire formats do.
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the value as a string slice if it is of type [`Value::String`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a slice of values if it is of type [`Value::Seq`].
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl<T: Into<Value>> FromIterator<T> for Value {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Value::Seq(iter.into_iter().map(Into::into).collect())
    }
}

/// The canonical textual rendering, used to build hash keys. Strings render without quotes,
/// integers in decimal, floats with the default formatting, and sequences/maps as compact JSON.
///
/// This rendering must stay stable across releases: changing it reassigns every user bucketed on
/// a non-string attribute.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(s),
            Value::Seq(_) | Value::Map(_) => {
                let rendered = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&rendered)
            }
        }
    }
}
