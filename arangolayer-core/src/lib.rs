//! A typed data-modeling and query layer for ArangoDB.
//!
//! This crate is the core of the arangolayer project and provides:
//!
//! - **Field descriptors** ([`field`], [`value`]) - Typed attributes with defaults and codecs
//! - **Schemas** ([`schema`], [`record`]) - Validating load/dump between raw records and entities
//! - **Entities** ([`entity`]) - Documents and edges with identity and a lifecycle
//! - **Graphs** ([`graph`]) - Named graph declarations
//! - **Query trees** ([`expr`], [`query`]) - Immutable, validated query construction
//! - **AQL compilation** ([`aql`]) - Query text plus bind parameters, never inlined literals
//! - **Transport** ([`transport`]) - The narrow request/response capability the client calls
//! - **Collections and cursors** ([`database`], [`collection`], [`cursor`], [`page`])
//! - **Error handling** ([`error`]) - The error taxonomy shared by every operation
//!
//! # Example
//!
//! ```ignore
//! use arangolayer::prelude::*;
//!
//! let users = Schema::document("users")
//!     .field(FieldDescriptor::new("name", FieldType::string()).required())
//!     .field(FieldDescriptor::new("age", FieldType::int()).with_default(0).omit_on_default())
//!     .build()?;
//!
//! let adults = Query::new(&users)
//!     .filter(Field::new("age").gt(18))?
//!     .sort("name", SortDirection::Asc)?
//!     .limit(10);
//!
//! let compiled = adults.compile()?;
//! assert_eq!(compiled.bind_vars["value_0"], 18);
//! ```

#[allow(unused_extern_crates)]
extern crate self as arangolayer_core;

pub mod aql;
pub mod collection;
pub mod config;
pub mod cursor;
pub mod database;
pub mod entity;
pub mod error;
pub mod expr;
pub mod field;
pub mod graph;
pub mod page;
pub mod query;
pub mod record;
pub mod registry;
pub mod schema;
pub mod transport;
pub mod value;
