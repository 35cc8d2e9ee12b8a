//! Typed in-memory field values.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Number, Value};
use uuid::Uuid;

use crate::{
    error::{ArangoError, ArangoResult},
    record::Record,
};

/// The in-memory value of a single field.
///
/// Values are produced by [`Schema::load`](crate::schema::Schema::load) from raw JSON and
/// turned back into JSON by [`Schema::dump`](crate::schema::Schema::dump). `Json` carries
/// untyped data for `Any` fields and for passthrough fields of open schemas.
///
/// A float field loaded from an integer literal holds `Int`, so that it is written back as the
/// same literal. Values set through the API are widened to `Float`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Explicit JSON `null`.
    Null,
    /// A boolean.
    Bool(bool),
    /// A 64-bit signed integer.
    Int(i64),
    /// A finite 64-bit float.
    Float(f64),
    /// A UTF-8 string.
    String(String),
    /// A UTC timestamp.
    DateTime(DateTime<Utc>),
    /// A UUID.
    Uuid(Uuid),
    /// Items of a list field.
    List(Vec<FieldValue>),
    /// A nested record of an embedded schema.
    Object(Record),
    /// Untyped JSON.
    Json(Value),
}

impl FieldValue {
    /// Short name of the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Int(_) => "int",
            FieldValue::Float(_) => "float",
            FieldValue::String(_) => "string",
            FieldValue::DateTime(_) => "datetime",
            FieldValue::Uuid(_) => "uuid",
            FieldValue::List(_) => "list",
            FieldValue::Object(_) => "object",
            FieldValue::Json(_) => "json",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null | FieldValue::Json(Value::Null))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            FieldValue::Json(value) => value.as_bool(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            FieldValue::Json(value) => value.as_i64(),
            _ => None,
        }
    }

    /// Returns the value as a float, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Json(value) => value.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            FieldValue::Json(value) => value.as_str(),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&DateTime<Utc>> {
        match self {
            FieldValue::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<&Uuid> {
        match self {
            FieldValue::Uuid(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            FieldValue::Object(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            FieldValue::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Converts the value to its natural JSON representation.
    ///
    /// Date-times become RFC 3339 strings in UTC, UUIDs hyphenated strings and records are
    /// dumped through their schema. Floats are always written as JSON floats, so `2.0` stays
    /// `2.0`.
    pub fn to_json(&self, field: &str) -> ArangoResult<Value> {
        Ok(match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Int(i) => Value::from(*i),
            FieldValue::Float(f) => float_to_json(field, *f)?,
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::DateTime(dt) => {
                Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            FieldValue::Uuid(id) => Value::String(id.hyphenated().to_string()),
            FieldValue::List(items) => Value::Array(
                items
                    .iter()
                    .map(|item| item.to_json(field))
                    .collect::<ArangoResult<Vec<_>>>()?,
            ),
            FieldValue::Object(record) => Value::Object(record.to_json()?),
            FieldValue::Json(value) => value.clone(),
        })
    }
}

fn float_to_json(field: &str, f: f64) -> ArangoResult<Value> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| ArangoError::deserialization(field, "finite float", f.to_string()))
}

/// Short name of a raw JSON value's type, used in error messages.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(value.into())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Int(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::DateTime(value)
    }
}

impl From<Uuid> for FieldValue {
    fn from(value: Uuid) -> Self {
        FieldValue::Uuid(value)
    }
}

impl From<Record> for FieldValue {
    fn from(value: Record) -> Self {
        FieldValue::Object(value)
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Json(value)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(values: Vec<T>) -> Self {
        FieldValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_floats_keep_their_form() {
        assert_eq!(FieldValue::Float(3.0).to_json("x").unwrap(), json!(3.0));
        assert_ne!(FieldValue::Float(3.0).to_json("x").unwrap(), json!(3));
        assert_eq!(FieldValue::Float(2.5).to_json("x").unwrap(), json!(2.5));
        assert_eq!(FieldValue::Int(3).to_json("x").unwrap(), json!(3));
    }

    #[test]
    fn test_non_finite_float_rejected() {
        let err = FieldValue::Float(f64::NAN).to_json("score").unwrap_err();

        assert!(matches!(err, ArangoError::Deserialization { ref field, .. } if field == "score"));
    }

    #[test]
    fn test_datetime_uses_utc_suffix() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        assert_eq!(
            FieldValue::DateTime(dt).to_json("at").unwrap(),
            json!("2024-01-02T03:04:05Z")
        );
    }

    #[test]
    fn test_accessors_widen_ints() {
        assert_eq!(FieldValue::Int(4).as_f64(), Some(4.0));
        assert_eq!(FieldValue::from(vec!["a", "b"]).as_list().map(|l| l.len()), Some(2));
        assert!(FieldValue::from(None::<i64>).is_null());
    }
}
