//! Collection name to schema lookup.

use serde_json::{Map, Value};
use std::{collections::BTreeMap, sync::Arc};

use crate::{
    entity::Entity,
    error::{ArangoError, ArangoResult},
    schema::{Schema, SchemaKind},
};

/// The schemas known to a database, keyed by collection name.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Arc<Schema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the schema of a collection.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Schema`] if another schema is registered for the same collection,
    /// or if the schema is an embedded schema (which has no collection).
    pub fn register(&mut self, schema: &Arc<Schema>) -> ArangoResult<()> {
        if schema.kind() == SchemaKind::Embedded {
            return Err(ArangoError::Schema(format!(
                "{} is an embedded schema and has no collection",
                schema.name()
            )));
        }
        if self.schemas.contains_key(schema.name()) {
            return Err(ArangoError::Schema(format!(
                "collection {} is already registered",
                schema.name()
            )));
        }

        self.schemas.insert(schema.name().to_string(), Arc::clone(schema));
        Ok(())
    }

    pub fn get(&self, collection: &str) -> Option<&Arc<Schema>> {
        self.schemas.get(collection)
    }

    pub fn contains(&self, collection: &str) -> bool {
        self.schemas.contains_key(collection)
    }

    /// Registered schemas, ordered by collection name.
    pub fn schemas(&self) -> impl Iterator<Item = &Arc<Schema>> {
        self.schemas.values()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// The registered schema of the collection named by a record's `_id`, if any.
    pub fn schema_for(&self, raw: &Map<String, Value>) -> Option<&Arc<Schema>> {
        let id = raw.get("_id")?.as_str()?;
        let (collection, _) = id.split_once('/')?;
        self.schemas.get(collection)
    }

    /// Loads a raw record with the schema of the collection its `_id` names.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::MissingField`] if the record has no `_id`,
    /// [`ArangoError::UnknownCollection`] if no schema is registered for its collection, and
    /// any error of [`Schema::load`].
    pub fn polymorph(&self, raw: &Map<String, Value>) -> ArangoResult<Entity> {
        let id = raw
            .get("_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ArangoError::MissingField("_id".to_string()))?;
        let collection = id.split_once('/').map_or(id, |(collection, _)| collection);
        let schema = self
            .schemas
            .get(collection)
            .ok_or_else(|| ArangoError::UnknownCollection(collection.to_string()))?;

        schema.load(raw)
    }
}
