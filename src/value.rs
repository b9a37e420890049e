//! Loosely-typed cell values found in record sequences.

use num_traits::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single field value of a record.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A name-like value; stored by its textual name.
    Symbol(String),
}

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Converts to an integer type, failing on fractions and out-of-range
    /// values.
    pub(crate) fn to_integer<T: FromPrimitive>(&self) -> Option<T> {
        match self {
            Self::Bool(b) => T::from_u8(u8::from(*b)),
            Self::Int(i) => T::from_i64(*i),
            Self::Float(f) if f.fract() == 0.0 => T::from_f64(*f),
            Self::Str(s) => s.trim().parse::<i64>().ok().and_then(T::from_i64),
            _ => None,
        }
    }

    pub(crate) fn to_f64(&self) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Int(i) => i.to_f64(),
            Self::Float(f) => Some(*f),
            Self::Str(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub(crate) fn to_f32(&self) -> Option<f32> {
        let f = self.to_f64()?;
        if f.is_finite() && f.abs() > f64::from(f32::MAX) {
            return None;
        }
        f.to_f32()
    }

    /// The textual form stored in string columns.
    pub(crate) fn to_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Str(s) | Self::Symbol(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// The textual form handed to type detection. Floats keep a fractional
    /// part or exponent so they are never read back as integers.
    pub(crate) fn to_sample_text(&self) -> Option<String> {
        match self {
            Self::Float(x) => Some(format!("{:?}", x)),
            other => other.to_text(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(x) => write!(f, "{}", x),
            Self::Int(x) => write!(f, "{}", x),
            Self::Float(x) => write!(f, "{}", x),
            Self::Str(x) => write!(f, "{}", x),
            Self::Symbol(x) => write!(f, ":{}", x),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map_or_else(|| n.as_f64().map_or(Self::Null, Self::Float), Self::Int),
            serde_json::Value::String(s) => Self::Str(s),
            other => Self::Str(other.to_string()),
        }
    }
}
