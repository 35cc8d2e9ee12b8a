//! Document schemas: the declared shape of a collection's documents.
//!
//! A [`Schema`] is an ordered set of [`FieldDescriptor`]s plus the collection it maps to and
//! whether that collection holds documents or edges. Schemas are built once, shared through
//! `Arc`, and never change afterwards.
//!
//! [`Schema::load`] turns a raw JSON record into an [`Entity`] and [`Schema::dump`] does the
//! reverse. For every valid raw record `r`, `dump(load(r)) == r`, except that fields marked
//! omit-on-default are dropped while they hold their default. A default filled in for a field
//! absent from `r` is readable but is not written back until the field is set.
//!
//! # Example
//!
//! ```ignore
//! use arangolayer::{field::{FieldDescriptor, FieldType}, schema::Schema};
//! use serde_json::json;
//!
//! let users = Schema::document("users")
//!     .field(FieldDescriptor::new("name", FieldType::string()).required())
//!     .field(FieldDescriptor::new("age", FieldType::int()).with_default(0).omit_on_default())
//!     .build()?;
//!
//! let ann = users.load(json!({"name": "Ann"}).as_object().unwrap())?;
//! assert_eq!(ann.get("age")?.and_then(|v| v.as_i64()), Some(0));
//! ```

use serde_json::{Map, Value};
use std::{collections::HashMap, sync::Arc};

use crate::{
    entity::{DocumentMeta, Endpoint, Entity},
    error::{ArangoError, ArangoResult},
    field::{FieldDescriptor, FieldType, PrimitiveType},
    record::Record,
    value::{FieldValue, json_type_name},
};

/// Identity and system attributes managed by the server.
pub const RESERVED_ATTRIBUTES: [&str; 5] = ["_key", "_id", "_rev", "_from", "_to"];

const MAX_KEY_LENGTH: usize = 254;

/// What a schema describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// Documents of a document collection.
    Document,
    /// Edges of an edge collection; they carry `_from` and `_to`.
    Edge,
    /// Embedded objects and query projections; no identity.
    Embedded,
}

impl SchemaKind {
    /// The ArangoDB collection type code (2 for documents, 3 for edges).
    pub fn collection_type(&self) -> Option<u8> {
        match self {
            SchemaKind::Document => Some(2),
            SchemaKind::Edge => Some(3),
            SchemaKind::Embedded => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SchemaKind::Document => "document",
            SchemaKind::Edge => "edge",
            SchemaKind::Embedded => "embedded",
        }
    }
}

#[derive(Debug)]
pub struct Schema {
    name: String,
    kind: SchemaKind,
    fields: Vec<FieldDescriptor>,
    positions: HashMap<String, usize>,
    open: bool,
    key_fields: Vec<String>,
}

impl Schema {
    /// Starts a schema for a document collection.
    pub fn document(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name.into(), SchemaKind::Document)
    }

    /// Starts a schema for an edge collection.
    pub fn edge(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name.into(), SchemaKind::Edge)
    }

    /// Starts a schema for objects embedded in other documents.
    pub fn embedded(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name.into(), SchemaKind::Embedded)
    }

    /// The collection name for document and edge schemas.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    pub fn is_edge(&self) -> bool {
        self.kind == SchemaKind::Edge
    }

    /// Whether undeclared fields are accepted and passed through.
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.position(name).map(|index| &self.fields[index])
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Fields whose values make up the document key.
    pub fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    /// Loads a raw record into an entity.
    ///
    /// Missing fields take their declared default; a missing required field without one fails.
    /// `_key`, `_id` and `_rev` become the entity's identity, and an entity that carries a
    /// `_rev` is considered persisted.
    ///
    /// # Errors
    ///
    /// - [`ArangoError::MissingField`] for absent required fields (and `_from`/`_to` of edges)
    /// - [`ArangoError::Deserialization`] for values of the wrong type
    /// - [`ArangoError::UnknownField`] for undeclared fields of a closed schema
    pub fn load(self: &Arc<Self>, raw: &Map<String, Value>) -> ArangoResult<Entity> {
        let record = self.load_record(raw)?;
        let meta = DocumentMeta {
            key: identity_attribute(raw, "_key")?,
            id: identity_attribute(raw, "_id")?,
            rev: identity_attribute(raw, "_rev")?,
        };

        let (from, to) = if self.is_edge() {
            let from = identity_attribute(raw, "_from")?
                .ok_or_else(|| ArangoError::MissingField("_from".to_string()))?;
            let to = identity_attribute(raw, "_to")?
                .ok_or_else(|| ArangoError::MissingField("_to".to_string()))?;
            (Some(Endpoint::Id(from)), Some(Endpoint::Id(to)))
        } else {
            (None, None)
        };

        Ok(Entity::from_parts(record, meta, from, to))
    }

    /// Dumps an entity into a raw record.
    ///
    /// # Errors
    ///
    /// - [`ArangoError::EntityDeleted`] if the entity was deleted
    /// - [`ArangoError::Reference`] if an edge endpoint has no `_id`
    /// - [`ArangoError::MissingField`] if a required field was removed
    pub fn dump(&self, entity: &Entity) -> ArangoResult<Map<String, Value>> {
        let record = entity.record()?;
        let meta = entity.meta();
        let mut out = Map::new();

        for (attribute, value) in [("_key", &meta.key), ("_id", &meta.id), ("_rev", &meta.rev)] {
            if let Some(value) = value {
                out.insert(attribute.to_string(), Value::String(value.clone()));
            }
        }

        if self.is_edge() {
            out.insert("_from".to_string(), Value::String(resolve_endpoint("_from", entity.from())?));
            out.insert("_to".to_string(), Value::String(resolve_endpoint("_to", entity.to())?));
        }

        self.dump_record(record, &mut out)?;
        Ok(out)
    }

    /// Computes the document key from the identity key fields.
    ///
    /// Key field values are joined with `:`; characters outside the key alphabet are
    /// percent-encoded. Returns `None` when the schema declares no key fields.
    pub fn compute_key(&self, record: &Record) -> ArangoResult<Option<String>> {
        if self.key_fields.is_empty() {
            return Ok(None);
        }

        let mut parts = Vec::with_capacity(self.key_fields.len());

        for name in &self.key_fields {
            let field = self
                .field(name)
                .ok_or_else(|| ArangoError::unknown_field(name, &self.name))?;
            let value = record
                .get(name)?
                .filter(|value| !value.is_null())
                .ok_or_else(|| ArangoError::MissingField(name.clone()))?;

            let part = match field.encode(value)? {
                Value::String(s) => s,
                other => other.to_string(),
            };
            parts.push(encode_key_part(&part));
        }

        let key = parts.join(":");
        if key.len() > MAX_KEY_LENGTH {
            return Err(ArangoError::Schema(format!(
                "computed key for {} is longer than {MAX_KEY_LENGTH} bytes",
                self.name
            )));
        }

        Ok(Some(key))
    }

    /// Resolves a dotted field path against this schema.
    ///
    /// Returns the declared type, or `None` when the path is accepted without a declared type
    /// (open schemas, `any` fields).
    pub fn resolve_path(&self, path: &[String]) -> ArangoResult<Option<FieldType>> {
        let unknown = || ArangoError::unknown_field(path.join("."), &self.name);
        if path.iter().any(String::is_empty) {
            return Err(unknown());
        }
        let (head, rest) = path.split_first().ok_or_else(unknown)?;

        if RESERVED_ATTRIBUTES.contains(&head.as_str()) {
            let edge_only = head == "_from" || head == "_to";
            if !rest.is_empty() || (edge_only && !self.is_edge()) {
                return Err(unknown());
            }
            return Ok(Some(FieldType::string()));
        }

        let Some(field) = self.field(head) else {
            return if self.open { Ok(None) } else { Err(unknown()) };
        };

        if rest.is_empty() {
            return Ok(Some(field.field_type().clone()));
        }

        match field.field_type() {
            FieldType::Nested(nested) => nested.resolve_path(rest).map_err(|_| unknown()),
            FieldType::Primitive(PrimitiveType::Any) => Ok(None),
            _ => Err(unknown()),
        }
    }

    /// Builds the row schema of a projection: every projected field is optional.
    pub(crate) fn projection(
        name: impl Into<String>,
        fields: Vec<(String, FieldType)>,
    ) -> Arc<Schema> {
        let fields: Vec<_> = fields
            .into_iter()
            .map(|(name, field_type)| FieldDescriptor::new(name, field_type))
            .collect();
        let positions = fields
            .iter()
            .enumerate()
            .map(|(index, field)| (field.name().to_string(), index))
            .collect();

        Arc::new(Schema {
            name: name.into(),
            kind: SchemaKind::Embedded,
            fields,
            positions,
            open: false,
            key_fields: Vec::new(),
        })
    }

    pub(crate) fn load_record(self: &Arc<Self>, raw: &Map<String, Value>) -> ArangoResult<Record> {
        let mut values = Vec::with_capacity(self.fields.len());
        let mut defaulted = vec![false; self.fields.len()];

        for (index, field) in self.fields.iter().enumerate() {
            let value = match raw.get(field.name()) {
                Some(raw) => Some(field.decode(raw)?),
                None => match field.default_value() {
                    Some(default) => {
                        defaulted[index] = true;
                        Some(default)
                    }
                    None if field.is_required() => {
                        return Err(ArangoError::MissingField(field.name().to_string()));
                    }
                    None => None,
                },
            };
            values.push(value);
        }

        let mut extra = Vec::new();
        for (key, value) in raw {
            let is_identity = self.kind != SchemaKind::Embedded
                && RESERVED_ATTRIBUTES.contains(&key.as_str());
            if is_identity || self.positions.contains_key(key) {
                continue;
            }
            if !self.open {
                return Err(ArangoError::unknown_field(key, &self.name));
            }
            extra.push((key.clone(), FieldValue::Json(value.clone())));
        }

        Ok(Record::from_parts(Arc::clone(self), values, defaulted, extra))
    }

    pub(crate) fn dump_record(&self, record: &Record, out: &mut Map<String, Value>) -> ArangoResult<()> {
        for (index, (field, value)) in self.fields.iter().zip(record.values()).enumerate() {
            match value {
                Some(_) if record.is_defaulted(index) => {}
                Some(value) if field.omits_default() && field.is_default(value) => {}
                Some(value) => {
                    out.insert(field.name().to_string(), field.encode(value)?);
                }
                None if field.is_required() => {
                    return Err(ArangoError::MissingField(field.name().to_string()));
                }
                None => {}
            }
        }

        for (key, value) in record.extra() {
            out.insert(key.clone(), value.to_json(key)?);
        }

        Ok(())
    }
}

fn identity_attribute(raw: &Map<String, Value>, name: &str) -> ArangoResult<Option<String>> {
    match raw.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ArangoError::deserialization(name, "string", json_type_name(other))),
    }
}

fn resolve_endpoint(side: &str, endpoint: Option<&Endpoint>) -> ArangoResult<String> {
    match endpoint {
        Some(Endpoint::Id(id)) if is_document_handle(id) => Ok(id.clone()),
        Some(Endpoint::Id(id)) => Err(ArangoError::Reference(format!(
            "{side} is not a document handle: {id:?}"
        ))),
        Some(Endpoint::Unresolved(collection)) => Err(ArangoError::Reference(format!(
            "{side} references a document of {collection} that has no _id"
        ))),
        None => Err(ArangoError::Reference(format!("{side} is not set"))),
    }
}

/// Whether `id` has the `collection/key` shape of a document handle.
pub(crate) fn is_document_handle(id: &str) -> bool {
    matches!(id.split_once('/'), Some((collection, key)) if !collection.is_empty() && !key.is_empty())
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_-:.@()+,=;$!*'".contains(c)
}

fn encode_key_part(part: &str) -> String {
    let mut encoded = String::with_capacity(part.len());
    for c in part.chars() {
        // `:` separates key parts, so it is encoded inside a part.
        if is_key_char(c) && c != ':' {
            encoded.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                encoded.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    encoded
}

fn is_valid_collection_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && name.len() <= 256
}

/// Builder for [`Schema`].
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    kind: SchemaKind,
    fields: Vec<FieldDescriptor>,
    open: bool,
    key_fields: Vec<String>,
}

impl SchemaBuilder {
    fn new(name: String, kind: SchemaKind) -> Self {
        Self {
            name,
            kind,
            fields: Vec::new(),
            open: false,
            key_fields: Vec::new(),
        }
    }

    /// Appends a field; fields keep the order in which they are added.
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Accepts undeclared fields and passes them through unchanged.
    pub fn open(mut self) -> Self {
        self.open = true;
        self
    }

    /// Declares the fields whose values compute the document key.
    pub fn key<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Validates the declaration and builds the schema.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Schema`] for invalid collection names, duplicate or reserved field
    /// names, defaults that do not match their field type, and invalid key fields.
    pub fn build(self) -> ArangoResult<Arc<Schema>> {
        let invalid = |reason: String| ArangoError::Schema(format!("{}: {reason}", self.name));

        if self.kind != SchemaKind::Embedded && !is_valid_collection_name(&self.name) {
            return Err(invalid("invalid collection name".to_string()));
        }

        let mut positions = HashMap::with_capacity(self.fields.len());
        for (index, field) in self.fields.iter().enumerate() {
            let name = field.name();
            if name.is_empty() || name.contains('.') {
                return Err(invalid(format!("invalid field name {name:?}")));
            }
            if RESERVED_ATTRIBUTES.contains(&name) {
                return Err(invalid(format!("field name {name} is reserved")));
            }
            if positions.insert(name.to_string(), index).is_some() {
                return Err(invalid(format!("duplicate field {name}")));
            }
            if let Some(default) = field.default() {
                field
                    .accept(default.produce())
                    .map_err(|err| invalid(format!("invalid default: {err}")))?;
            }
        }

        if self.kind == SchemaKind::Embedded && !self.key_fields.is_empty() {
            return Err(invalid("embedded schemas have no key".to_string()));
        }
        for key in &self.key_fields {
            let Some(index) = positions.get(key) else {
                return Err(invalid(format!("key field {key} is not declared")));
            };
            if !matches!(self.fields[*index].field_type(), FieldType::Primitive(_)) {
                return Err(invalid(format!("key field {key} must be a primitive")));
            }
        }

        Ok(Arc::new(Schema {
            name: self.name,
            kind: self.kind,
            fields: self.fields,
            positions,
            open: self.open,
            key_fields: self.key_fields,
        }))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{SecondsFormat, TimeZone, Utc};
    use proptest::prelude::*;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::entity::EntityState;

    fn users() -> Arc<Schema> {
        Schema::document("users")
            .field(FieldDescriptor::new("name", FieldType::string()).required())
            .field(
                FieldDescriptor::new("age", FieldType::int())
                    .with_default(0)
                    .omit_on_default(),
            )
            .build()
            .unwrap()
    }

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_load_applies_default_and_dump_omits_it() {
        let schema = users();
        let ann = schema.load(&raw(json!({"name": "Ann"}))).unwrap();

        assert_eq!(ann.get("age").unwrap(), Some(&FieldValue::Int(0)));
        assert_eq!(schema.dump(&ann).unwrap(), raw(json!({"name": "Ann"})));
        assert_eq!(ann.state(), EntityState::Unbound);
    }

    #[test]
    fn test_absent_default_is_not_written_until_set() {
        let schema = Schema::document("members")
            .field(FieldDescriptor::new("name", FieldType::string()).required())
            .field(FieldDescriptor::new("role", FieldType::string()).with_default("member"))
            .build()
            .unwrap();

        let mut ann = schema.load(&raw(json!({"name": "Ann"}))).unwrap();
        assert_eq!(ann.get("role").unwrap(), Some(&FieldValue::from("member")));
        assert_eq!(schema.dump(&ann).unwrap(), raw(json!({"name": "Ann"})));

        ann.set("role", "member").unwrap();
        assert_eq!(schema.dump(&ann).unwrap(), raw(json!({"name": "Ann", "role": "member"})));

        let mut bob = Entity::new(&schema);
        bob.set("name", "Bob").unwrap();
        assert_eq!(schema.dump(&bob).unwrap(), raw(json!({"name": "Bob", "role": "member"})));
    }

    #[test]
    fn test_round_trip_keeps_identity_and_nulls() {
        let schema = Schema::document("people")
            .field(FieldDescriptor::new("name", FieldType::string()).required())
            .field(FieldDescriptor::new("nickname", FieldType::string()))
            .field(FieldDescriptor::new("tags", FieldType::list_of(FieldType::string())))
            .build()
            .unwrap();
        let record = raw(json!({
            "_key": "1",
            "_id": "people/1",
            "_rev": "_abc",
            "name": "Ann",
            "nickname": null,
            "tags": ["a", "b"],
        }));

        let entity = schema.load(&record).unwrap();

        assert_eq!(entity.state(), EntityState::Persisted);
        assert_eq!(schema.dump(&entity).unwrap(), record);
    }

    #[test]
    fn test_missing_required_field() {
        let err = users().load(&raw(json!({"age": 3}))).unwrap_err();

        assert!(matches!(err, ArangoError::MissingField(ref name) if name == "name"));
    }

    #[test]
    fn test_wrong_type_names_field() {
        let err = users().load(&raw(json!({"name": "Ann", "age": "old"}))).unwrap_err();

        assert!(matches!(
            err,
            ArangoError::Deserialization { ref field, ref expected, ref got }
                if field == "age" && expected == "int" && got == "string"
        ));
    }

    #[test]
    fn test_closed_schema_rejects_unknown_fields() {
        let err = users().load(&raw(json!({"name": "Ann", "email": "a@b"}))).unwrap_err();

        assert!(matches!(err, ArangoError::UnknownField { ref field, .. } if field == "email"));
    }

    #[test]
    fn test_open_schema_passes_fields_through() {
        let schema = Schema::document("events")
            .field(FieldDescriptor::new("kind", FieldType::string()))
            .open()
            .build()
            .unwrap();
        let record = raw(json!({"kind": "click", "payload": {"x": 1}}));

        let entity = schema.load(&record).unwrap();

        assert_eq!(entity.keys().unwrap().collect::<Vec<_>>(), vec!["kind", "payload"]);
        assert_eq!(schema.dump(&entity).unwrap(), record);
    }

    #[test]
    fn test_nested_schema_round_trip() {
        let address = Schema::embedded("address")
            .field(FieldDescriptor::new("city", FieldType::string()).required())
            .build()
            .unwrap();
        let schema = Schema::document("customers")
            .field(FieldDescriptor::new("address", FieldType::nested(&address)))
            .build()
            .unwrap();
        let record = raw(json!({"address": {"city": "Oslo"}}));

        let entity = schema.load(&record).unwrap();
        let city = entity
            .get("address")
            .unwrap()
            .and_then(FieldValue::as_record)
            .and_then(|address| address.get("city").ok().flatten().cloned());

        assert_eq!(city, Some(FieldValue::from("Oslo")));
        assert_eq!(schema.dump(&entity).unwrap(), record);

        let err = schema.load(&raw(json!({"address": {}}))).unwrap_err();
        assert!(matches!(err, ArangoError::MissingField(ref name) if name == "city"));
    }

    #[test]
    fn test_edge_requires_endpoints() {
        let knows = Schema::edge("knows").build().unwrap();

        let err = knows.load(&raw(json!({"_from": "users/1"}))).unwrap_err();
        assert!(matches!(err, ArangoError::MissingField(ref name) if name == "_to"));

        let edge = knows
            .load(&raw(json!({"_from": "users/1", "_to": "users/2"})))
            .unwrap();
        assert_eq!(edge.from().and_then(Endpoint::id), Some("users/1"));
    }

    #[test]
    fn test_compute_key_encodes_parts() {
        let schema = Schema::document("accounts")
            .field(FieldDescriptor::new("tenant", FieldType::string()).required())
            .field(FieldDescriptor::new("number", FieldType::int()).required())
            .key(["tenant", "number"])
            .build()
            .unwrap();
        let entity = schema.load(&raw(json!({"tenant": "acme corp/eu", "number": 7}))).unwrap();

        let key = schema.compute_key(entity.record().unwrap()).unwrap();

        assert_eq!(key.as_deref(), Some("acme%20corp%2Feu:7"));
    }

    #[test]
    fn test_builder_rejects_invalid_declarations() {
        let duplicate = Schema::document("users")
            .field(FieldDescriptor::new("name", FieldType::string()))
            .field(FieldDescriptor::new("name", FieldType::int()))
            .build();
        let reserved = Schema::document("users")
            .field(FieldDescriptor::new("_key", FieldType::string()))
            .build();
        let bad_default = Schema::document("users")
            .field(FieldDescriptor::new("age", FieldType::int()).with_default("zero"))
            .build();
        let bad_key = Schema::document("users").key(["email"]).build();
        let bad_name = Schema::document("9lives").build();

        for result in [duplicate, reserved, bad_default, bad_key, bad_name] {
            assert!(matches!(result, Err(ArangoError::Schema(_))));
        }
    }

    #[test]
    fn test_resolve_path() {
        let address = Schema::embedded("address")
            .field(FieldDescriptor::new("city", FieldType::string()))
            .build()
            .unwrap();
        let schema = Schema::document("customers")
            .field(FieldDescriptor::new("address", FieldType::nested(&address)))
            .field(FieldDescriptor::new("meta", FieldType::any()))
            .build()
            .unwrap();
        let path = |p: &str| p.split('.').map(String::from).collect::<Vec<_>>();

        assert_eq!(schema.resolve_path(&path("address.city")).unwrap(), Some(FieldType::string()));
        assert_eq!(schema.resolve_path(&path("meta.anything")).unwrap(), None);
        assert!(schema.resolve_path(&path("_key")).is_ok());
        assert!(schema.resolve_path(&path("_from")).is_err());
        for empty in ["", "address.", ".address", "address..city"] {
            assert!(matches!(
                schema.resolve_path(&path(empty)),
                Err(ArangoError::UnknownField { .. })
            ));
        }
        assert!(schema.resolve_path(&[]).is_err());
        assert!(matches!(
            schema.resolve_path(&path("address.zip")),
            Err(ArangoError::UnknownField { ref field, .. }) if field == "address.zip"
        ));
    }

    fn profiles() -> Arc<Schema> {
        let address = Schema::embedded("address")
            .field(FieldDescriptor::new("city", FieldType::string()).required())
            .field(FieldDescriptor::new("zip", FieldType::int()))
            .build()
            .unwrap();
        Schema::document("profiles")
            .field(FieldDescriptor::new("name", FieldType::string()).required())
            .field(FieldDescriptor::new("count", FieldType::int()))
            .field(FieldDescriptor::new("score", FieldType::float()))
            .field(FieldDescriptor::new("seen", FieldType::datetime()))
            .field(FieldDescriptor::new("token", FieldType::uuid()))
            .field(FieldDescriptor::new("address", FieldType::nested(&address)))
            .field(FieldDescriptor::new("tags", FieldType::list_of(FieldType::string())))
            .field(FieldDescriptor::new("nickname", FieldType::string()))
            .field(FieldDescriptor::new("role", FieldType::string()).with_default("member"))
            .open()
            .build()
            .unwrap()
    }

    fn score() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<i32>().prop_map(|i| json!(i)),
            (-1.0e12f64..1.0e12).prop_map(|f| json!(f)),
        ]
    }

    fn timestamp() -> impl Strategy<Value = String> {
        (0i64..4_102_444_800, 0u32..1000).prop_map(|(seconds, millis)| {
            Utc.timestamp_opt(seconds, millis * 1_000_000)
                .unwrap()
                .to_rfc3339_opts(SecondsFormat::AutoSi, true)
        })
    }

    fn address() -> impl Strategy<Value = Value> {
        ("[a-z]{1,8}", prop::option::of(0i64..99_999)).prop_map(|(city, zip)| match zip {
            Some(zip) => json!({"city": city, "zip": zip}),
            None => json!({"city": city}),
        })
    }

    proptest! {
        #[test]
        fn test_load_then_dump_reproduces_record(
            name in "[a-zA-Z ]{0,12}",
            count in any::<i64>(),
            score in score(),
            seen in timestamp(),
            token in any::<u128>(),
            address in address(),
            tags in prop::collection::vec("[a-z]{0,5}", 0..4),
            nickname in prop::option::of(prop::option::of("[a-z]{1,6}")),
            role in prop::option::of("[a-z]{1,6}"),
            note in prop::option::of(any::<i32>()),
        ) {
            let schema = profiles();
            let mut record = raw(json!({
                "name": name,
                "count": count,
                "score": score,
                "seen": seen,
                "token": Uuid::from_u128(token).hyphenated().to_string(),
                "address": address,
                "tags": tags,
            }));
            if let Some(nickname) = nickname {
                record.insert("nickname".to_string(), json!(nickname));
            }
            if let Some(role) = role {
                record.insert("role".to_string(), json!(role));
            }
            if let Some(note) = note {
                record.insert("note".to_string(), json!(note));
            }

            let entity = schema.load(&record).unwrap();

            prop_assert_eq!(schema.dump(&entity).unwrap(), record);
        }

        #[test]
        fn test_int_field_rejects_values_beyond_i64(
            big in (i64::MAX as u64 + 1)..=u64::MAX,
            huge in 1.0e19f64..1.0e300,
        ) {
            for count in [json!(big), json!(huge), json!(-huge)] {
                let result = profiles().load(&raw(json!({"name": "Ann", "count": count})));
                prop_assert!(matches!(
                    result,
                    Err(ArangoError::Deserialization { ref field, .. }) if field == "count"
                ), "expected Deserialization error on field `count`, got {:?}", result);
            }
        }
    }
}
