//! Scalar attribute values exchanged between records, queries and the store.
//!
//! # Responsibility
//! - Define the closed set of scalar values an attribute can hold.
//! - Convert values to/from SQLite bindings and JSON.
//!
//! # Invariants
//! - `Bool` is persisted as INTEGER 0/1 and restored through the declared kind.
//! - Nested JSON (arrays/objects) is never a valid attribute value.

use indexmap::IndexMap;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Ordered attribute mapping. Order is declaration order for records and
/// caller order for projections.
pub type Attributes = IndexMap<String, Value>;

/// Builds an [`Attributes`] mapping from `name => value` pairs.
///
/// ```
/// use activestore_core::attributes;
/// let attrs = attributes! { "name" => "Alice", "age" => 28 };
/// assert_eq!(attrs.len(), 2);
/// ```
#[macro_export]
macro_rules! attributes {
    () => { $crate::Attributes::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut attrs = $crate::Attributes::new();
        $( attrs.insert(::std::string::String::from($name), $crate::Value::from($value)); )+
        attrs
    }};
}

/// Storage kind of a declared attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrKind {
    Text,
    Integer,
    Real,
    Bool,
}

impl AttrKind {
    /// Column type used for the attribute in entity tables.
    pub(crate) fn sql_type(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer | Self::Bool => "INTEGER",
            Self::Real => "REAL",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Bool => "bool",
        }
    }
}

/// A scalar attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

/// A value could not be represented with the requested attribute kind.
#[derive(Debug, Clone, PartialEq)]
pub struct KindMismatch {
    pub expected: AttrKind,
    pub found: String,
}

impl Display for KindMismatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "expected {} value, found {}", self.expected.label(), self.found)
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Bool(value) => Some(i64::from(*value)),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Self::Real(value) => Some(*value),
            Self::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            Self::Integer(value) => Some(*value != 0),
            _ => None,
        }
    }

    /// Converts the value into the representation of `kind`.
    ///
    /// `Null` is valid for every kind. Lossless numeric widening/narrowing is
    /// accepted; anything else is a mismatch.
    pub fn coerce(self, kind: AttrKind) -> Result<Self, KindMismatch> {
        match (kind, self) {
            (_, Self::Null) => Ok(Self::Null),
            (AttrKind::Text, Self::Text(text)) => Ok(Self::Text(text)),
            (AttrKind::Integer, Self::Integer(value)) => Ok(Self::Integer(value)),
            (AttrKind::Integer, Self::Bool(value)) => Ok(Self::Integer(i64::from(value))),
            (AttrKind::Integer, Self::Real(value))
                if value.fract() == 0.0 && value.abs() < i64::MAX as f64 =>
            {
                Ok(Self::Integer(value as i64))
            }
            (AttrKind::Real, Self::Real(value)) => Ok(Self::Real(value)),
            (AttrKind::Real, Self::Integer(value)) => Ok(Self::Real(value as f64)),
            (AttrKind::Bool, Self::Bool(value)) => Ok(Self::Bool(value)),
            (AttrKind::Bool, Self::Integer(value)) => Ok(Self::Bool(value != 0)),
            (_, other) => Err(KindMismatch {
                expected: kind,
                found: other.describe(),
            }),
        }
    }

    /// Reads a SQLite column value using the declared attribute kind.
    pub(crate) fn from_sql(value: ValueRef<'_>, kind: AttrKind) -> Result<Self, String> {
        match value {
            ValueRef::Null => Ok(Self::Null),
            ValueRef::Integer(raw) => Self::Integer(raw).coerce(kind).map_err(|err| err.to_string()),
            ValueRef::Real(raw) => Self::Real(raw).coerce(kind).map_err(|err| err.to_string()),
            ValueRef::Text(raw) => {
                let text = std::str::from_utf8(raw).map_err(|err| err.to_string())?;
                Self::Text(text.to_string())
                    .coerce(kind)
                    .map_err(|err| err.to_string())
            }
            ValueRef::Blob(_) => Err("blob values are not supported".to_string()),
        }
    }

    /// Converts a JSON scalar into a value of `kind`.
    pub(crate) fn from_json(json: &serde_json::Value, kind: AttrKind) -> Result<Self, KindMismatch> {
        let raw = match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(value) => Self::Bool(*value),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(value) => Self::Integer(value),
                None => Self::Real(number.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(text) => Self::Text(text.clone()),
            serde_json::Value::Array(_) => {
                return Err(KindMismatch {
                    expected: kind,
                    found: "array".to_string(),
                })
            }
            serde_json::Value::Object(_) => {
                return Err(KindMismatch {
                    expected: kind,
                    found: "object".to_string(),
                })
            }
        };
        raw.coerce(kind)
    }

    pub(crate) fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(value) => serde_json::Value::Bool(*value),
            Self::Integer(value) => serde_json::Value::from(*value),
            Self::Real(value) => serde_json::Number::from_f64(*value)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Text(text) => serde_json::Value::String(text.clone()),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(value) => format!("bool `{value}`"),
            Self::Integer(value) => format!("integer `{value}`"),
            Self::Real(value) => format!("real `{value}`"),
            Self::Text(text) => format!("text `{text}`"),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(SqlValue::Null),
            Self::Bool(value) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*value))),
            Self::Integer(value) => ToSqlOutput::Owned(SqlValue::Integer(*value)),
            Self::Real(value) => ToSqlOutput::Owned(SqlValue::Real(*value)),
            Self::Text(text) => ToSqlOutput::Borrowed(ValueRef::Text(text.as_bytes())),
        })
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<uuid::Uuid> for Value {
    fn from(value: uuid::Uuid) -> Self {
        Self::Text(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::{AttrKind, Value};
    use rusqlite::types::ValueRef;

    #[test]
    fn coerce_widens_and_narrows_losslessly() {
        assert_eq!(Value::Integer(3).coerce(AttrKind::Real), Ok(Value::Real(3.0)));
        assert_eq!(Value::Real(4.0).coerce(AttrKind::Integer), Ok(Value::Integer(4)));
        assert_eq!(Value::Integer(0).coerce(AttrKind::Bool), Ok(Value::Bool(false)));
        assert!(Value::Real(4.5).coerce(AttrKind::Integer).is_err());
        assert!(Value::from("x").coerce(AttrKind::Integer).is_err());
        assert_eq!(Value::Null.coerce(AttrKind::Text), Ok(Value::Null));
    }

    #[test]
    fn sql_integer_restores_declared_bool() {
        let value = Value::from_sql(ValueRef::Integer(1), AttrKind::Bool).unwrap();
        assert_eq!(value, Value::Bool(true));
    }

    #[test]
    fn json_rejects_nested_values() {
        let nested = serde_json::json!({"a": 1});
        assert!(Value::from_json(&nested, AttrKind::Text).is_err());
        let number = serde_json::json!(28);
        assert_eq!(
            Value::from_json(&number, AttrKind::Integer).unwrap(),
            Value::Integer(28)
        );
    }

    #[test]
    fn attributes_macro_keeps_insertion_order() {
        let attrs = crate::attributes! { "name" => "Bob", "age" => 55, "active" => true };
        let keys: Vec<&str> = attrs.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "age", "active"]);
        assert_eq!(attrs["age"], Value::Integer(55));
    }
}
