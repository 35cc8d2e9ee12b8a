//! Typed documents, edges, graphs and queries for ArangoDB.
//!
//! This crate is the primary entry point of the arangolayer project. It re-exports the core
//! modules and provides access to the available transports.
//!
//! # Features
//!
//! - **Declarative schemas** - Typed fields with defaults, codecs and omit-on-default
//! - **Entities with identity** - `_key`/`_id`/`_rev` tracking and optimistic concurrency
//! - **Composable queries** - Immutable query trees compiled to AQL with bind parameters only
//! - **Graphs** - Graph declarations and traversals over graphs or edge collections
//!
//! # Quick Start
//!
//! ```ignore
//! use arangolayer::{prelude::*, memory::MemoryTransport};
//!
//! #[tokio::main]
//! async fn main() -> ArangoResult<()> {
//!     let users = Schema::document("users")
//!         .field(FieldDescriptor::new("name", FieldType::string()).required())
//!         .field(FieldDescriptor::new("age", FieldType::int()).with_default(0).omit_on_default())
//!         .build()?;
//!
//!     let mut db = Database::new(MemoryTransport::builder().build().await?, ClientConfig::default());
//!     db.register(&users)?;
//!     db.ensure_collection(&users).await?;
//!
//!     let collection = db.collection(&users);
//!     let mut ann = Entity::new(&users);
//!     ann.set("name", "Ann")?;
//!     collection.create(&mut ann).await?;
//!
//!     ann.set("age", 31)?;
//!     collection.update(&mut ann).await?;
//!
//!     let adults = Query::new(&users)
//!         .filter(Field::new("age").gt(18))?
//!         .sort("name", SortDirection::Asc)?
//!         .limit(10);
//!     let found = collection.query(&adults)?.collect().await?;
//!     println!("{} adults", found.len());
//!     Ok(())
//! }
//! ```
//!
//! # Optimistic concurrency
//!
//! Updates send the revision the entity was last read or written at. When the server holds a
//! newer revision the update fails with [`ArangoError::Conflict`](error::ArangoError::Conflict)
//! and the entity is left as it was. Nothing is retried automatically:
//!
//! ```ignore
//! if let Err(ArangoError::Conflict { .. }) = collection.update(&mut ann).await {
//!     collection.refresh(&mut ann).await?;
//!     ann.set("age", 32)?;
//!     collection.update(&mut ann).await?;
//! }
//! ```
//!
//! # Transports
//!
//! - [`memory`] - In-memory emulation of the REST API for development and tests
//! - Any type implementing [`Transport`](transport::Transport)

pub mod prelude;

pub use arangolayer_core::{
    aql, collection, config, cursor, database, entity, error, expr, field, graph, page, query, record,
    registry, schema, transport, value,
};

// Re-export the wire value type for convenience
pub use serde_json;

/// In-memory transport implementations.
pub mod memory {
    pub use arangolayer_memory::{MemoryTransport, MemoryTransportBuilder};
}
