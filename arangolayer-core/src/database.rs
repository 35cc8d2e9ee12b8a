//! The database handle: schema registration, collection and graph setup, and queries.
//!
//! # Example
//!
//! ```ignore
//! use arangolayer::{config::ClientConfig, database::Database};
//!
//! let mut db = Database::new(transport, ClientConfig::default().with_database("shop"));
//! db.register(&users)?;
//! db.ensure_collection(&users).await?;
//!
//! let users = db.collection(&users);
//! let ann = users.get("ann").await?;
//! ```

use serde_json::{Map, Value, json};
use std::sync::Arc;

use crate::{
    aql::CompiledQuery,
    collection::Collection,
    config::ClientConfig,
    cursor::{self, Cursor},
    entity::Entity,
    error::{ArangoError, ArangoResult, TransportError},
    graph::GraphDefinition,
    query::Query,
    registry::SchemaRegistry,
    schema::Schema,
    transport::{self, Request, Transport, api_path},
    value::json_type_name,
};

const DOCUMENT_COLLECTION: u8 = 2;
const EDGE_COLLECTION: u8 = 3;

/// A database reachable through a transport.
///
/// # Type Parameters
///
/// * `T` - The transport implementation
#[derive(Debug)]
pub struct Database<T: Transport> {
    transport: T,
    config: ClientConfig,
    registry: SchemaRegistry,
}

impl<T: Transport> Database<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            registry: SchemaRegistry::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.database
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Registers a schema so polymorphic queries can load its documents.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Schema`] if a schema for the same collection is already registered.
    pub fn register(&mut self, schema: &Arc<Schema>) -> ArangoResult<()> {
        self.registry.register(schema)
    }

    /// Gets the collection proxy of a schema.
    pub fn collection<'a>(&'a self, schema: &Arc<Schema>) -> Collection<'a, T> {
        Collection::new(self, schema)
    }

    /// Creates the collection of a schema unless it exists.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::CollectionType`] if the collection exists with the other type, and
    /// [`ArangoError::Schema`] for embedded schemas.
    pub async fn ensure_collection(&self, schema: &Arc<Schema>) -> ArangoResult<()> {
        let collection_type = schema.kind().collection_type().ok_or_else(|| {
            ArangoError::Schema(format!("{} is an embedded schema and has no collection", schema.name()))
        })?;
        self.ensure_collection_named(schema.name(), collection_type).await
    }

    /// Drops a collection and every document in it.
    pub async fn drop_collection(&self, name: &str) -> ArangoResult<()> {
        let request = Request::delete(self.path(&["collection", name]));
        transport::send(&self.transport, request, &format!("collection {name}")).await?;
        tracing::info!(collection = name, "dropped collection");
        Ok(())
    }

    /// Lists the names of all non-system collections.
    pub async fn list_collections(&self) -> ArangoResult<Vec<String>> {
        let request = Request::get(self.path(&["collection"])).with_query("excludeSystem", "true");
        let body = transport::send(&self.transport, request, "collections").await?;
        let listed = body
            .get("result")
            .and_then(Value::as_array)
            .ok_or_else(|| TransportError::InvalidResponse("collection list lacks result".to_string()))?;

        let mut names: Vec<String> = listed
            .iter()
            .filter_map(|collection| collection.get("name").and_then(Value::as_str))
            .filter(|name| !name.starts_with('_'))
            .map(str::to_string)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Creates every collection of a graph that is missing, then the graph itself unless the
    /// server already knows it.
    pub async fn ensure_graph(&self, graph: &GraphDefinition) -> ArangoResult<()> {
        for name in graph.vertex_collections() {
            self.ensure_collection_named(name, DOCUMENT_COLLECTION).await?;
        }
        for name in graph.edge_collections() {
            self.ensure_collection_named(name, EDGE_COLLECTION).await?;
        }

        let what = format!("graph {}", graph.name);
        let lookup = Request::get(self.path(&["gharial", &graph.name]));
        match transport::send(&self.transport, lookup, &what).await {
            Ok(_) => return Ok(()),
            Err(ArangoError::NotFound { .. }) => {}
            Err(err) => return Err(err),
        }

        let request = Request::post(self.path(&["gharial"])).with_body(serde_json::to_value(graph)?);
        transport::send(&self.transport, request, &what).await?;
        tracing::info!(graph = %graph.name, "created graph");
        Ok(())
    }

    /// Drops a graph, optionally with the collections only it uses.
    pub async fn drop_graph(&self, name: &str, drop_collections: bool) -> ArangoResult<()> {
        let request = Request::delete(self.path(&["gharial", name]))
            .with_query("dropCollections", drop_collections.to_string());
        transport::send(&self.transport, request, &format!("graph {name}")).await?;
        tracing::info!(graph = name, drop_collections, "dropped graph");
        Ok(())
    }

    pub fn compile(&self, query: &Query) -> ArangoResult<CompiledQuery> {
        query.compile()
    }

    /// Compiles a query and lets the server parse it without running it.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::UnsupportedQuery`] if the server rejects the query text.
    pub async fn validate(&self, query: &Query) -> ArangoResult<()> {
        let compiled = query.compile()?;
        let request = Request::post(self.path(&["query"])).with_body(json!({"query": compiled.text}));
        let response = self.transport.execute(request).await?;

        if response.status == 400 {
            let api = response.api_error();
            return Err(ArangoError::unsupported("Query", api.message));
        }
        transport::check(response, "query").map(|_| ())
    }

    /// Runs a query and loads every row with the registered schema its `_id` names, falling
    /// back to the result schema of the query.
    pub fn query<'a>(&'a self, query: &Query) -> ArangoResult<Cursor<'a, Entity>> {
        let compiled = query.compile()?;
        let fallback = Arc::clone(query.result_schema());
        let registry = &self.registry;

        Ok(self.cursor(&compiled, false, move |row| {
            let raw = row_object(row)?;
            registry.schema_for(&raw).unwrap_or(&fallback).load(&raw)
        }))
    }

    /// Runs a query and yields its rows as raw JSON.
    pub fn query_json<'a>(&'a self, query: &Query) -> ArangoResult<Cursor<'a, Value>> {
        let compiled = query.compile()?;
        Ok(self.cursor(&compiled, false, Ok))
    }

    pub(crate) fn cursor<'a, R, F>(&'a self, compiled: &CompiledQuery, full_count: bool, decode: F) -> Cursor<'a, R>
    where
        F: Fn(Value) -> ArangoResult<R> + Send + Sync + 'a,
    {
        tracing::debug!(
            query = %compiled.text,
            bind_vars = compiled.bind_vars.len(),
            "opening cursor"
        );
        let request = cursor::open_request(&self.config, compiled, full_count);
        Cursor::new(&self.transport, &self.config.database, request, decode)
    }

    pub(crate) fn path(&self, segments: &[&str]) -> String {
        api_path(&self.config.database, segments)
    }

    async fn ensure_collection_named(&self, name: &str, collection_type: u8) -> ArangoResult<()> {
        let what = format!("collection {name}");
        let lookup = Request::get(self.path(&["collection", name]));

        match transport::send(&self.transport, lookup, &what).await {
            Ok(body) => {
                let found = body.get("type").and_then(Value::as_u64).unwrap_or(0);
                if found == u64::from(collection_type) {
                    Ok(())
                } else {
                    Err(ArangoError::CollectionType {
                        collection: name.to_string(),
                        expected: type_name(u64::from(collection_type)).to_string(),
                        found: type_name(found).to_string(),
                    })
                }
            }
            Err(ArangoError::NotFound { .. }) => {
                let request = Request::post(self.path(&["collection"]))
                    .with_body(json!({"name": name, "type": collection_type}));
                transport::send(&self.transport, request, &what).await?;
                tracing::info!(collection = name, collection_type, "created collection");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

fn type_name(collection_type: u64) -> &'static str {
    match collection_type {
        2 => "document",
        3 => "edge",
        _ => "unknown",
    }
}

/// Unwraps a result row that must be a JSON object.
pub(crate) fn row_object(row: Value) -> ArangoResult<Map<String, Value>> {
    match row {
        Value::Object(map) => Ok(map),
        other => Err(ArangoError::deserialization("<row>", "object", json_type_name(&other))),
    }
}
