//! Field descriptors: name, type, presence rules and wire codec of a single schema field.
//!
//! A [`FieldDescriptor`] is immutable once its schema is built. Its [`FieldType`] decides how a
//! value is validated when set and how it is converted to and from JSON, unless a custom
//! [`FieldCodec`] is attached.
//!
//! # Example
//!
//! ```ignore
//! use arangolayer::field::{FieldDescriptor, FieldType};
//!
//! let name = FieldDescriptor::new("name", FieldType::string()).required();
//! let age = FieldDescriptor::new("age", FieldType::int())
//!     .with_default(0)
//!     .omit_on_default();
//! ```

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::{fmt::Debug, sync::Arc};
use uuid::Uuid;

use crate::{
    error::{ArangoError, ArangoResult},
    schema::Schema,
    value::{FieldValue, json_type_name},
};

/// Scalar field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    /// UTF-8 string.
    String,
    /// 64-bit signed integer; JSON floats and integers outside the `i64` range are rejected.
    Int,
    /// 64-bit float; JSON integers are accepted.
    Float,
    /// Boolean.
    Bool,
    /// UTC timestamp, RFC 3339 string on the wire.
    DateTime,
    /// Hyphenated string on the wire.
    Uuid,
    /// Raw JSON, accepted without validation.
    Any,
}

impl PrimitiveType {
    /// Name used in type descriptions and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveType::String => "string",
            PrimitiveType::Int => "int",
            PrimitiveType::Float => "float",
            PrimitiveType::Bool => "bool",
            PrimitiveType::DateTime => "datetime",
            PrimitiveType::Uuid => "uuid",
            PrimitiveType::Any => "any",
        }
    }
}

/// The declared type of a field.
#[derive(Debug, Clone)]
pub enum FieldType {
    /// A scalar.
    Primitive(PrimitiveType),
    /// An embedded object described by its own schema.
    Nested(Arc<Schema>),
    /// A homogeneous list.
    ListOf(Box<FieldType>),
}

impl PartialEq for FieldType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldType::Primitive(a), FieldType::Primitive(b)) => a == b,
            (FieldType::Nested(a), FieldType::Nested(b)) => {
                Arc::ptr_eq(a, b) || a.name() == b.name()
            }
            (FieldType::ListOf(a), FieldType::ListOf(b)) => a == b,
            _ => false,
        }
    }
}

impl FieldType {
    /// A string field.
    pub fn string() -> Self {
        FieldType::Primitive(PrimitiveType::String)
    }

    /// An integer field.
    pub fn int() -> Self {
        FieldType::Primitive(PrimitiveType::Int)
    }

    /// A float field.
    pub fn float() -> Self {
        FieldType::Primitive(PrimitiveType::Float)
    }

    /// A boolean field.
    pub fn bool() -> Self {
        FieldType::Primitive(PrimitiveType::Bool)
    }

    /// A UTC timestamp field.
    pub fn datetime() -> Self {
        FieldType::Primitive(PrimitiveType::DateTime)
    }

    /// A UUID field.
    pub fn uuid() -> Self {
        FieldType::Primitive(PrimitiveType::Uuid)
    }

    /// A field holding arbitrary JSON.
    pub fn any() -> Self {
        FieldType::Primitive(PrimitiveType::Any)
    }

    /// An embedded object described by `schema`.
    pub fn nested(schema: &Arc<Schema>) -> Self {
        FieldType::Nested(Arc::clone(schema))
    }

    /// A list whose items have type `item`.
    pub fn list_of(item: FieldType) -> Self {
        FieldType::ListOf(Box::new(item))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, FieldType::ListOf(_))
    }

    /// Human readable type description, e.g. `list<int>` or `object<address>`.
    pub fn describe(&self) -> String {
        match self {
            FieldType::Primitive(p) => p.name().to_string(),
            FieldType::Nested(schema) => format!("object<{}>", schema.name()),
            FieldType::ListOf(item) => format!("list<{}>", item.describe()),
        }
    }

    /// Checks an in-memory value against this type, widening ints into float fields.
    pub(crate) fn check(&self, field: &str, value: FieldValue) -> ArangoResult<FieldValue> {
        let mismatch = |value: &FieldValue| {
            ArangoError::deserialization(field, self.describe(), value.type_name())
        };

        match (self, value) {
            (_, FieldValue::Null) => Ok(FieldValue::Null),
            (FieldType::Primitive(PrimitiveType::Any), value) => Ok(value),
            (FieldType::Primitive(PrimitiveType::String), v @ FieldValue::String(_))
            | (FieldType::Primitive(PrimitiveType::Int), v @ FieldValue::Int(_))
            | (FieldType::Primitive(PrimitiveType::Float), v @ FieldValue::Float(_))
            | (FieldType::Primitive(PrimitiveType::Bool), v @ FieldValue::Bool(_))
            | (FieldType::Primitive(PrimitiveType::DateTime), v @ FieldValue::DateTime(_))
            | (FieldType::Primitive(PrimitiveType::Uuid), v @ FieldValue::Uuid(_)) => Ok(v),
            (FieldType::Primitive(PrimitiveType::Float), FieldValue::Int(i)) => {
                Ok(FieldValue::Float(i as f64))
            }
            (FieldType::Nested(schema), FieldValue::Object(record)) => {
                if record.schema().name() == schema.name() {
                    Ok(FieldValue::Object(record))
                } else {
                    Err(ArangoError::deserialization(
                        field,
                        self.describe(),
                        format!("object<{}>", record.schema().name()),
                    ))
                }
            }
            (FieldType::ListOf(item), FieldValue::List(items)) => items
                .into_iter()
                .map(|value| item.check(field, value))
                .collect::<ArangoResult<Vec<_>>>()
                .map(FieldValue::List),
            (_, value) => Err(mismatch(&value)),
        }
    }

    /// Decodes a raw JSON value into a typed value.
    pub(crate) fn decode(&self, field: &str, raw: &Value) -> ArangoResult<FieldValue> {
        let mismatch = || ArangoError::deserialization(field, self.describe(), json_type_name(raw));

        match (self, raw) {
            (FieldType::Primitive(PrimitiveType::Any), raw) => Ok(FieldValue::Json(raw.clone())),
            (_, Value::Null) => Ok(FieldValue::Null),
            (FieldType::Primitive(PrimitiveType::String), Value::String(s)) => {
                Ok(FieldValue::String(s.clone()))
            }
            (FieldType::Primitive(PrimitiveType::Int), Value::Number(n)) => {
                n.as_i64().map(FieldValue::Int).ok_or_else(mismatch)
            }
            // Integer literals stay `Int` so they dump back without a fraction.
            (FieldType::Primitive(PrimitiveType::Float), Value::Number(n)) => match n.as_i64() {
                Some(i) if !n.is_f64() => Ok(FieldValue::Int(i)),
                _ => n.as_f64().map(FieldValue::Float).ok_or_else(mismatch),
            },
            (FieldType::Primitive(PrimitiveType::Bool), Value::Bool(b)) => Ok(FieldValue::Bool(*b)),
            (FieldType::Primitive(PrimitiveType::DateTime), Value::String(s)) => {
                DateTime::parse_from_rfc3339(s)
                    .map(|dt| FieldValue::DateTime(dt.with_timezone(&Utc)))
                    .map_err(|_| {
                        ArangoError::deserialization(field, "datetime", format!("string {s:?}"))
                    })
            }
            (FieldType::Primitive(PrimitiveType::Uuid), Value::String(s)) => Uuid::parse_str(s)
                .map(FieldValue::Uuid)
                .map_err(|_| ArangoError::deserialization(field, "uuid", format!("string {s:?}"))),
            (FieldType::Nested(schema), Value::Object(map)) => {
                Ok(FieldValue::Object(schema.load_record(map)?))
            }
            (FieldType::ListOf(item), Value::Array(items)) => items
                .iter()
                .map(|raw| item.decode(field, raw))
                .collect::<ArangoResult<Vec<_>>>()
                .map(FieldValue::List),
            _ => Err(mismatch()),
        }
    }
}

/// Custom conversion between a field's in-memory value and its JSON form.
///
/// Attach a codec with [`FieldDescriptor::with_codec`] to override the conversion derived from
/// the field type. Codecs are never called with `Null`.
pub trait FieldCodec: Send + Sync + Debug {
    fn encode(&self, field: &str, value: &FieldValue) -> ArangoResult<Value>;
    fn decode(&self, field: &str, raw: &Value) -> ArangoResult<FieldValue>;
}

/// Stores a `DateTime` as integer milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpochMillis;

impl FieldCodec for EpochMillis {
    fn encode(&self, field: &str, value: &FieldValue) -> ArangoResult<Value> {
        match value {
            FieldValue::DateTime(dt) => Ok(Value::from(dt.timestamp_millis())),
            other => Err(ArangoError::deserialization(field, "datetime", other.type_name())),
        }
    }

    fn decode(&self, field: &str, raw: &Value) -> ArangoResult<FieldValue> {
        raw.as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .map(FieldValue::DateTime)
            .ok_or_else(|| ArangoError::deserialization(field, "epoch millis", json_type_name(raw)))
    }
}

/// Default value of a field: a fixed value or a factory called for every new record.
#[derive(Clone)]
pub enum DefaultValue {
    Value(FieldValue),
    Factory(Arc<dyn Fn() -> FieldValue + Send + Sync>),
}

impl Debug for DefaultValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DefaultValue::Value(value) => f.debug_tuple("Value").field(value).finish(),
            DefaultValue::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

impl DefaultValue {
    pub fn produce(&self) -> FieldValue {
        match self {
            DefaultValue::Value(value) => value.clone(),
            DefaultValue::Factory(factory) => factory(),
        }
    }
}

/// Declares one field of a [`Schema`].
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: String,
    field_type: FieldType,
    required: bool,
    default: Option<DefaultValue>,
    omit_on_default: bool,
    codec: Option<Arc<dyn FieldCodec>>,
}

impl FieldDescriptor {
    /// Creates an optional field with no default.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            default: None,
            omit_on_default: false,
            codec: None,
        }
    }

    /// Marks the field as required: loading a record without it fails with `MissingField`
    /// unless a default is declared.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    /// Uses a factory for the default, e.g. `Utc::now` for creation timestamps.
    pub fn with_default_fn<F, V>(mut self, factory: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<FieldValue>,
    {
        self.default = Some(DefaultValue::Factory(Arc::new(move || factory().into())));
        self
    }

    /// Omits the field from dumped records while it holds its (fixed) default value.
    pub fn omit_on_default(mut self) -> Self {
        self.omit_on_default = true;
        self
    }

    pub fn with_codec(mut self, codec: impl FieldCodec + 'static) -> Self {
        self.codec = Some(Arc::new(codec));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    pub fn omits_default(&self) -> bool {
        self.omit_on_default
    }

    pub(crate) fn default_value(&self) -> Option<FieldValue> {
        self.default.as_ref().map(DefaultValue::produce)
    }

    /// Validates a value before it is stored in a record.
    pub(crate) fn accept(&self, value: FieldValue) -> ArangoResult<FieldValue> {
        if value.is_null() && self.required {
            return Err(ArangoError::deserialization(
                &self.name,
                self.field_type.describe(),
                "null",
            ));
        }

        self.field_type.check(&self.name, value)
    }

    pub(crate) fn encode(&self, value: &FieldValue) -> ArangoResult<Value> {
        match (&self.codec, value) {
            (_, FieldValue::Null) => Ok(Value::Null),
            (Some(codec), value) => codec.encode(&self.name, value),
            (None, value) => value.to_json(&self.name),
        }
    }

    pub(crate) fn decode(&self, raw: &Value) -> ArangoResult<FieldValue> {
        match (&self.codec, raw) {
            (_, Value::Null) if self.required => Err(ArangoError::deserialization(
                &self.name,
                self.field_type.describe(),
                "null",
            )),
            (_, Value::Null) => Ok(FieldValue::Null),
            (Some(codec), raw) => codec.decode(&self.name, raw),
            (None, raw) => self.field_type.decode(&self.name, raw),
        }
    }

    /// True when the value equals the fixed default.
    pub(crate) fn is_default(&self, value: &FieldValue) -> bool {
        let Some(DefaultValue::Value(default)) = &self.default else {
            return false;
        };
        match (default, value) {
            (FieldValue::Float(d), FieldValue::Int(i)) | (FieldValue::Int(i), FieldValue::Float(d)) => {
                *d == *i as f64
            }
            _ => default == value,
        }
    }
}
