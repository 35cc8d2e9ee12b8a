//! Entities: schema-bound records with a server identity and a lifecycle.
//!
//! An [`Entity`] starts `Unbound`. A successful create makes it `Persisted`, any local mutation
//! makes a persisted entity `Stale`, a successful update makes it `Persisted` again and a
//! successful delete makes it `Deleted`, after which every field access fails.
//!
//! Edges are entities of an edge schema; they additionally carry `_from` and `_to`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::{
    error::{ArangoError, ArangoResult},
    record::Record,
    schema::Schema,
    value::FieldValue,
};

/// Lifecycle state of an [`Entity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Never written to the server.
    Unbound,
    /// In sync with the last known server revision.
    Persisted,
    /// Persisted, with local changes not yet written.
    Stale,
    /// Deleted on the server.
    Deleted,
}

/// Server-assigned identity of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    #[serde(rename = "_key", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
}

/// One end of an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A document handle (`collection/key`).
    Id(String),
    /// A document of the named collection that had no `_id` when the endpoint was set.
    Unresolved(String),
}

impl Endpoint {
    pub fn id(&self) -> Option<&str> {
        match self {
            Endpoint::Id(id) => Some(id),
            Endpoint::Unresolved(_) => None,
        }
    }
}

impl From<&Entity> for Endpoint {
    fn from(entity: &Entity) -> Self {
        match entity.id() {
            Some(id) => Endpoint::Id(id.to_string()),
            None => Endpoint::Unresolved(entity.schema().name().to_string()),
        }
    }
}

impl From<&str> for Endpoint {
    fn from(id: &str) -> Self {
        Endpoint::Id(id.to_string())
    }
}

impl From<String> for Endpoint {
    fn from(id: String) -> Self {
        Endpoint::Id(id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    record: Record,
    meta: DocumentMeta,
    from: Option<Endpoint>,
    to: Option<Endpoint>,
    state: EntityState,
}

impl Entity {
    /// Creates an unbound entity holding the schema's defaults.
    pub fn new(schema: &Arc<Schema>) -> Self {
        Self {
            record: Record::new(schema),
            meta: DocumentMeta::default(),
            from: None,
            to: None,
            state: EntityState::Unbound,
        }
    }

    pub(crate) fn from_parts(
        record: Record,
        meta: DocumentMeta,
        from: Option<Endpoint>,
        to: Option<Endpoint>,
    ) -> Self {
        let state = if meta.rev.is_some() {
            EntityState::Persisted
        } else {
            EntityState::Unbound
        };

        Self { record, meta, from, to, state }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        self.record.schema()
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    /// True when the entity has local state the server does not know about.
    pub fn is_dirty(&self) -> bool {
        matches!(self.state, EntityState::Unbound | EntityState::Stale)
    }

    pub fn meta(&self) -> &DocumentMeta {
        &self.meta
    }

    pub fn key(&self) -> Option<&str> {
        self.meta.key.as_deref()
    }

    pub fn id(&self) -> Option<&str> {
        self.meta.id.as_deref()
    }

    pub fn rev(&self) -> Option<&str> {
        self.meta.rev.as_deref()
    }

    /// Chooses the key an unbound entity will be created with.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Schema`] once the entity has been persisted.
    pub fn set_key(&mut self, key: impl Into<String>) -> ArangoResult<()> {
        if self.state != EntityState::Unbound {
            return Err(ArangoError::Schema(format!(
                "cannot change the key of persisted entity {}",
                self.handle()
            )));
        }
        self.meta.key = Some(key.into());
        Ok(())
    }

    /// The underlying record.
    pub fn record(&self) -> ArangoResult<&Record> {
        self.ensure_live()?;
        Ok(&self.record)
    }

    pub fn get(&self, name: &str) -> ArangoResult<Option<&FieldValue>> {
        self.ensure_live()?;
        self.record.get(name)
    }

    /// Sets a field. A persisted entity becomes stale.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> ArangoResult<()> {
        self.ensure_live()?;
        self.record.set(name, value)?;
        self.touch();
        Ok(())
    }

    /// Removes a field. A persisted entity becomes stale.
    pub fn remove(&mut self, name: &str) -> ArangoResult<Option<FieldValue>> {
        self.ensure_live()?;
        let previous = self.record.remove(name)?;
        self.touch();
        Ok(previous)
    }

    pub fn contains(&self, name: &str) -> ArangoResult<bool> {
        self.ensure_live()?;
        Ok(self.record.contains(name))
    }

    pub fn iter(&self) -> ArangoResult<impl Iterator<Item = (&str, &FieldValue)>> {
        self.ensure_live()?;
        Ok(self.record.iter())
    }

    pub fn keys(&self) -> ArangoResult<impl Iterator<Item = &str>> {
        self.ensure_live()?;
        Ok(self.record.keys())
    }

    pub fn len(&self) -> ArangoResult<usize> {
        self.ensure_live()?;
        Ok(self.record.len())
    }

    pub fn from(&self) -> Option<&Endpoint> {
        self.from.as_ref()
    }

    pub fn to(&self) -> Option<&Endpoint> {
        self.to.as_ref()
    }

    /// Sets the `_from` endpoint of an edge.
    ///
    /// An endpoint taken from an entity without an `_id` is accepted here and rejected with
    /// [`ArangoError::Reference`] when the edge is dumped.
    pub fn set_from(&mut self, endpoint: impl Into<Endpoint>) -> ArangoResult<()> {
        self.ensure_edge("_from")?;
        self.from = Some(endpoint.into());
        self.touch();
        Ok(())
    }

    /// Sets the `_to` endpoint of an edge.
    pub fn set_to(&mut self, endpoint: impl Into<Endpoint>) -> ArangoResult<()> {
        self.ensure_edge("_to")?;
        self.to = Some(endpoint.into());
        self.touch();
        Ok(())
    }

    /// Sets both endpoints of an edge.
    pub fn connect(
        &mut self,
        from: impl Into<Endpoint>,
        to: impl Into<Endpoint>,
    ) -> ArangoResult<()> {
        self.set_from(from)?;
        self.set_to(to)
    }

    /// Dumps the entity through its schema.
    pub fn dump(&self) -> ArangoResult<Map<String, Value>> {
        self.schema().dump(self)
    }

    /// `_id` if known, otherwise a description of the unbound document.
    pub fn handle(&self) -> String {
        match (&self.meta.id, &self.meta.key) {
            (Some(id), _) => id.clone(),
            (None, Some(key)) => format!("{}/{key}", self.schema().name()),
            (None, None) => format!("{}/<unbound>", self.schema().name()),
        }
    }

    /// Adopts the identity returned by a successful write.
    pub(crate) fn mark_persisted(&mut self, meta: DocumentMeta) {
        if meta.key.is_some() {
            self.meta.key = meta.key;
        }
        if meta.id.is_some() {
            self.meta.id = meta.id;
        }
        if meta.rev.is_some() {
            self.meta.rev = meta.rev;
        }
        self.state = EntityState::Persisted;
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.state = EntityState::Deleted;
    }

    /// Replaces contents and identity with a freshly loaded copy.
    pub(crate) fn replace_with(&mut self, fresh: Entity) {
        *self = fresh;
        self.state = EntityState::Persisted;
    }

    fn touch(&mut self) {
        if self.state == EntityState::Persisted {
            self.state = EntityState::Stale;
        }
    }

    fn ensure_live(&self) -> ArangoResult<()> {
        match self.state {
            EntityState::Deleted => Err(ArangoError::EntityDeleted(self.handle())),
            _ => Ok(()),
        }
    }

    fn ensure_edge(&self, attribute: &str) -> ArangoResult<()> {
        self.ensure_live()?;
        if self.schema().is_edge() {
            Ok(())
        } else {
            Err(ArangoError::unknown_field(attribute, self.schema().name()))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::field::{FieldDescriptor, FieldType};

    fn users() -> Arc<Schema> {
        Schema::document("users")
            .field(FieldDescriptor::new("name", FieldType::string()).required())
            .field(FieldDescriptor::new("age", FieldType::int()).with_default(0))
            .build()
            .unwrap()
    }

    fn persisted(schema: &Arc<Schema>) -> Entity {
        let raw = json!({"_key": "1", "_id": "users/1", "_rev": "_a", "name": "Ann"});
        schema.load(raw.as_object().unwrap()).unwrap()
    }

    #[test]
    fn test_mutation_makes_persisted_entity_stale() {
        let mut ann = persisted(&users());
        assert_eq!(ann.state(), EntityState::Persisted);

        ann.set("age", 30).unwrap();

        assert_eq!(ann.state(), EntityState::Stale);
        assert!(ann.is_dirty());
    }

    #[test]
    fn test_unbound_entity_stays_unbound_on_mutation() {
        let mut ann = Entity::new(&users());
        ann.set("name", "Ann").unwrap();

        assert_eq!(ann.state(), EntityState::Unbound);
        assert_eq!(ann.get("age").unwrap(), Some(&FieldValue::Int(0)));
    }

    #[test]
    fn test_set_rejects_unknown_and_mistyped_fields() {
        let mut ann = persisted(&users());

        assert!(matches!(ann.set("email", "a@b"), Err(ArangoError::UnknownField { .. })));
        assert!(matches!(ann.set("age", "old"), Err(ArangoError::Deserialization { .. })));
        assert_eq!(ann.state(), EntityState::Persisted);
    }

    #[test]
    fn test_deleted_entity_rejects_access() {
        let mut ann = persisted(&users());
        ann.mark_deleted();

        assert!(matches!(ann.get("name"), Err(ArangoError::EntityDeleted(ref id)) if id == "users/1"));
        assert!(matches!(ann.set("name", "Bo"), Err(ArangoError::EntityDeleted(_))));
        assert!(ann.iter().is_err());
        assert!(ann.dump().is_err());
    }

    #[test]
    fn test_edge_with_unbound_endpoint_fails_on_dump() {
        let users = users();
        let knows = Schema::edge("knows").build().unwrap();
        let ann = persisted(&users);
        let bob = Entity::new(&users);

        let mut edge = Entity::new(&knows);
        edge.connect(&ann, &bob).unwrap();

        assert_eq!(edge.to(), Some(&Endpoint::Unresolved("users".to_string())));
        assert!(matches!(edge.dump(), Err(ArangoError::Reference(_))));

        edge.set_to("users/2").unwrap();
        let raw = edge.dump().unwrap();
        assert_eq!(raw.get("_from"), Some(&json!("users/1")));
        assert_eq!(raw.get("_to"), Some(&json!("users/2")));
    }

    #[test]
    fn test_documents_have_no_endpoints() {
        let mut ann = Entity::new(&users());

        assert!(matches!(ann.set_from("users/2"), Err(ArangoError::UnknownField { .. })));
    }

    #[test]
    fn test_key_is_fixed_once_persisted() {
        let schema = users();
        let mut fresh = Entity::new(&schema);
        fresh.set_key("ann").unwrap();
        assert_eq!(fresh.handle(), "users/ann");

        let mut ann = persisted(&schema);
        assert!(ann.set_key("other").is_err());
    }

    #[test]
    fn test_mark_persisted_merges_identity() {
        let mut ann = Entity::new(&users());
        ann.mark_persisted(DocumentMeta {
            key: Some("9".to_string()),
            id: Some("users/9".to_string()),
            rev: Some("_x".to_string()),
        });
        ann.mark_persisted(DocumentMeta {
            rev: Some("_y".to_string()),
            ..DocumentMeta::default()
        });

        assert_eq!((ann.id(), ann.rev()), (Some("users/9"), Some("_y")));
    }
}
