use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A scalar literal carried by a condition.
///
/// Values are never rendered into SQL text; the compiler binds each one as a
/// named parameter. `null` has no representation here: null checks are
/// expressed with `IS_NULL` / `IS_NOT_NULL`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// String value.
    Text(String),
    /// UUID, bound natively so it compares against `uuid` columns.
    ///
    /// Never produced from client JSON, where UUIDs stay [`QueryValue::Text`];
    /// keys read back from the database carry it.
    Uuid(Uuid),
}

impl QueryValue {
    /// Convert a JSON scalar into a `QueryValue`.
    ///
    /// # Errors
    ///
    /// Returns a description of the offending shape when the JSON value is
    /// `null`, an array or an object.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, String> {
        match value {
            serde_json::Value::Bool(b) => Ok(Self::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Self::Float(f))
                } else {
                    Err(format!("unsupported number `{n}`"))
                }
            }
            serde_json::Value::String(s) => Ok(Self::Text(s.clone())),
            serde_json::Value::Null => Err("null is not a valid value".to_owned()),
            serde_json::Value::Array(_) => Err("expected a scalar, found an array".to_owned()),
            serde_json::Value::Object(_) => Err("expected a scalar, found an object".to_owned()),
        }
    }

    /// JSON representation of this value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(n) => serde_json::Value::from(*n),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Uuid(u) => serde_json::Value::String(u.to_string()),
        }
    }

    /// Returns the string payload for `Text` values.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::Uuid(_) => None,
        }
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Uuid(u) => write!(f, "{u}"),
        }
    }
}

impl From<bool> for QueryValue {
    #[inline]
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for QueryValue {
    #[inline]
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for QueryValue {
    #[inline]
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f64> for QueryValue {
    #[inline]
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<String> for QueryValue {
    #[inline]
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Uuid> for QueryValue {
    #[inline]
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

impl From<&str> for QueryValue {
    #[inline]
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}
