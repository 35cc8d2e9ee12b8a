//! The collection proxy: CRUD and queries for the documents of one schema.
//!
//! A [`Collection`] binds a [`Schema`] to the server collection of the same name. Entities are
//! serialized through the schema on the way out and loaded through it on the way back, and
//! server failures are translated into [`ArangoError`] kinds.
//!
//! # Example
//!
//! ```ignore
//! let users = db.collection(&users_schema);
//!
//! let mut ann = Entity::new(&users_schema);
//! ann.set("name", "Ann")?;
//! users.create(&mut ann).await?;
//!
//! ann.set("age", 31)?;
//! match users.update(&mut ann).await {
//!     Err(ArangoError::Conflict { .. }) => users.refresh(&mut ann).await?,
//!     other => { other?; }
//! }
//! ```

use futures::StreamExt;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::{
    cursor::Cursor,
    database::{Database, row_object},
    entity::{DocumentMeta, Entity, EntityState},
    error::{ArangoError, ArangoResult},
    expr::Field,
    page::{Page, PaginationParams},
    query::{Direction, Query, Traversal, TraversalTarget},
    schema::Schema,
    transport::{self, Request, Transport},
};

/// A schema-bound proxy of a server collection.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the database reference
/// * `T` - The transport implementation
#[derive(Debug)]
pub struct Collection<'a, T: Transport> {
    database: &'a Database<T>,
    schema: Arc<Schema>,
}

impl<'a, T: Transport> Collection<'a, T> {
    pub(crate) fn new(database: &'a Database<T>, schema: &Arc<Schema>) -> Self {
        Self {
            database,
            schema: Arc::clone(schema),
        }
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Reads a document by key.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::NotFound`] if the collection has no document with this key, and
    /// the errors of [`Schema::load`] if the stored document does not fit the schema.
    pub async fn get(&self, key: &str) -> ArangoResult<Entity> {
        let request = Request::get(self.document_path(Some(key)));
        let body = self.send(request, &self.handle(key)).await?;
        self.schema.load(&row_object(body)?)
    }

    /// Creates the document of an unbound entity and adopts the identity the server assigns.
    ///
    /// The key is taken from the entity if set, otherwise computed from the schema's key fields,
    /// otherwise left to the server.
    ///
    /// # Errors
    ///
    /// - [`ArangoError::Reference`] if an edge endpoint has no `_id`
    /// - [`ArangoError::AlreadyExists`] if the entity was already created or the key is taken
    /// - [`ArangoError::EntityDeleted`] if the entity was deleted
    pub async fn create(&self, entity: &mut Entity) -> ArangoResult<DocumentMeta> {
        self.check_schema(entity)?;
        match entity.state() {
            EntityState::Unbound => {}
            EntityState::Deleted => return Err(ArangoError::EntityDeleted(entity.handle())),
            _ => {
                return Err(ArangoError::AlreadyExists {
                    what: entity.handle(),
                    cause: None,
                });
            }
        }

        let mut body = self.schema.dump(entity)?;
        body.remove("_id");
        body.remove("_rev");
        if !body.contains_key("_key") {
            if let Some(key) = self.schema.compute_key(entity.record()?)? {
                body.insert("_key".to_string(), Value::String(key));
            }
        }

        let what = match body.get("_key").and_then(Value::as_str) {
            Some(key) => self.handle(key),
            None => entity.handle(),
        };
        let request = Request::post(self.document_path(None)).with_body(Value::Object(body));
        let meta: DocumentMeta = serde_json::from_value(self.send(request, &what).await?)?;

        tracing::debug!(collection = self.name(), key = ?meta.key, "created document");
        entity.mark_persisted(meta.clone());
        Ok(meta)
    }

    /// Replaces the stored document with the entity, provided the server still holds the
    /// revision the entity was last read or written at.
    ///
    /// # Errors
    ///
    /// - [`ArangoError::Conflict`] if the server revision differs; the entity is left untouched
    /// - [`ArangoError::NotPersisted`] if the entity was never created
    /// - [`ArangoError::NotFound`] if the document no longer exists
    pub async fn update(&self, entity: &mut Entity) -> ArangoResult<DocumentMeta> {
        self.check_schema(entity)?;
        let key = self.persisted_key(entity)?;
        let what = self.handle(&key);

        let mut body = self.schema.dump(entity)?;
        body.remove("_id");
        let request = Request::put(self.document_path(Some(&key)))
            .with_query("ignoreRevs", "false")
            .with_body(Value::Object(body));

        let response = match self.send(request, &what).await {
            Err(ArangoError::Conflict { id, remote_rev, cause }) => {
                tracing::warn!(
                    document = %id,
                    local_rev = ?entity.rev(),
                    remote_rev = ?remote_rev,
                    "revision conflict"
                );
                return Err(ArangoError::Conflict { id, remote_rev, cause });
            }
            other => other?,
        };
        let meta: DocumentMeta = serde_json::from_value(response)?;

        tracing::debug!(collection = self.name(), key = %key, rev = ?meta.rev, "updated document");
        entity.mark_persisted(meta.clone());
        Ok(meta)
    }

    /// Deletes the document of a persisted entity; the entity becomes `Deleted`.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::NotFound`] if the document does not exist,
    /// [`ArangoError::NotPersisted`] for unbound entities and [`ArangoError::EntityDeleted`] for
    /// entities that were already deleted.
    pub async fn delete(&self, entity: &mut Entity) -> ArangoResult<()> {
        self.check_schema(entity)?;
        let key = self.persisted_key(entity)?;

        let request = Request::delete(self.document_path(Some(&key)));
        self.send(request, &self.handle(&key)).await?;

        tracing::debug!(collection = self.name(), key = %key, "deleted document");
        entity.mark_deleted();
        Ok(())
    }

    /// Reloads an entity from the server, discarding local changes and adopting the current
    /// revision. This is the way to retry after a [`ArangoError::Conflict`].
    pub async fn refresh(&self, entity: &mut Entity) -> ArangoResult<()> {
        self.check_schema(entity)?;
        let key = self.persisted_key(entity)?;
        let fresh = self.get(&key).await?;
        entity.replace_with(fresh);
        Ok(())
    }

    /// Runs a query over this collection.
    ///
    /// The query is compiled right away, so build errors surface here; nothing is sent until
    /// the cursor is first polled. Rows are loaded with the result schema of the query.
    pub fn query(&self, query: &Query) -> ArangoResult<Cursor<'a, Entity>> {
        self.check_query(query)?;
        let compiled = query.compile()?;
        let schema = Arc::clone(query.result_schema());

        Ok(self
            .database
            .cursor(&compiled, false, move |row| schema.load(&row_object(row)?)))
    }

    /// Streams every document of the collection.
    pub fn all(&self) -> ArangoResult<Cursor<'a, Entity>> {
        self.query(&Query::new(&self.schema))
    }

    /// Runs one page of a query.
    ///
    /// The page window is appended to the query as `LIMIT offset, per_page`, and the total
    /// count is the number of rows the query yields without that window.
    pub async fn page(&self, query: &Query, params: PaginationParams) -> ArangoResult<Page<Entity>> {
        self.check_query(query)?;
        let windowed = query.slice(params.offset(), params.per_page);
        let compiled = windowed.compile()?;
        let schema = Arc::clone(windowed.result_schema());

        let mut cursor = self
            .database
            .cursor(&compiled, true, move |row| schema.load(&row_object(row)?));
        let mut items = Vec::new();
        while let Some(item) = cursor.next().await {
            items.push(item?);
        }

        let count = cursor
            .full_count()
            .unwrap_or_else(|| params.offset() + items.len() as u64);
        Ok(Page::new(items, &params, count))
    }

    /// Streams the documents `vertex` is connected to through one edge of this collection.
    ///
    /// Rows are loaded polymorphically by their `_id`, falling back to the schema of `vertex`.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Schema`] if this is not an edge collection,
    /// [`ArangoError::NotPersisted`] if the vertex has no `_id` and
    /// [`ArangoError::EntityDeleted`] if it was deleted.
    pub fn connections(&self, vertex: &Entity, direction: Direction) -> ArangoResult<Cursor<'a, Entity>> {
        if !self.schema.is_edge() {
            return Err(ArangoError::Schema(format!(
                "connections need an edge collection, {} holds documents",
                self.name()
            )));
        }
        let id = match (vertex.state(), vertex.id()) {
            (EntityState::Deleted, _) => return Err(ArangoError::EntityDeleted(vertex.handle())),
            (EntityState::Unbound, _) | (_, None) => {
                return Err(ArangoError::NotPersisted(vertex.handle()));
            }
            (_, Some(id)) => id.to_string(),
        };

        let query = Query::new(vertex.schema())
            .filter(Field::new("_id").eq(id))?
            .traverse(Traversal::new(
                direction,
                TraversalTarget::edges(&[&self.schema]),
                "neighbour",
                vertex.schema(),
            ))?;
        self.database.query(&query)
    }

    /// Documents reached from `vertex` along outgoing edges.
    pub fn outbounds(&self, vertex: &Entity) -> ArangoResult<Cursor<'a, Entity>> {
        self.connections(vertex, Direction::Outbound)
    }

    /// Documents with an edge pointing at `vertex`.
    pub fn inbounds(&self, vertex: &Entity) -> ArangoResult<Cursor<'a, Entity>> {
        self.connections(vertex, Direction::Inbound)
    }

    /// Creates a persistent index over the given field paths unless an identical one exists.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::UnknownField`] if a path is not declared by the schema.
    pub async fn ensure_index(&self, fields: &[&str], unique: bool) -> ArangoResult<()> {
        for field in fields {
            let path: Vec<String> = field.split('.').map(str::to_string).collect();
            self.schema.resolve_path(&path)?;
        }

        let request = Request::post(self.database.path(&["index"]))
            .with_query("collection", self.name())
            .with_body(json!({"type": "persistent", "fields": fields, "unique": unique}));
        let body = self.send(request, &format!("index on {}", self.name())).await?;

        if body.get("isNewlyCreated").and_then(Value::as_bool).unwrap_or(false) {
            tracing::info!(collection = self.name(), ?fields, unique, "created index");
        }
        Ok(())
    }

    async fn send(&self, request: Request, what: &str) -> ArangoResult<Value> {
        transport::send(self.database.transport(), request, what).await
    }

    fn document_path(&self, key: Option<&str>) -> String {
        match key {
            Some(key) => self.database.path(&["document", self.name(), key]),
            None => self.database.path(&["document", self.name()]),
        }
    }

    fn handle(&self, key: &str) -> String {
        format!("{}/{key}", self.name())
    }

    fn check_schema(&self, entity: &Entity) -> ArangoResult<()> {
        if entity.schema().name() == self.name() {
            Ok(())
        } else {
            Err(ArangoError::Schema(format!(
                "entity of {} used with collection {}",
                entity.schema().name(),
                self.name()
            )))
        }
    }

    fn check_query(&self, query: &Query) -> ArangoResult<()> {
        let target = query.root().schema().name();
        if target == self.name() {
            Ok(())
        } else {
            Err(ArangoError::unsupported(
                "Query",
                format!("query over {target} run on collection {}", self.name()),
            ))
        }
    }

    fn persisted_key(&self, entity: &Entity) -> ArangoResult<String> {
        match (entity.state(), entity.key()) {
            (EntityState::Deleted, _) => Err(ArangoError::EntityDeleted(entity.handle())),
            (EntityState::Unbound, _) | (_, None) => Err(ArangoError::NotPersisted(entity.handle())),
            (_, Some(key)) => Ok(key.to_string()),
        }
    }
}
