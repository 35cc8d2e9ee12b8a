//! Convenient re-exports of commonly used types from arangolayer.
//!
//! ```ignore
//! use arangolayer::prelude::*;
//! ```
//!
//! This provides access to:
//! - Schemas, field descriptors and values
//! - Entities and graph declarations
//! - Query construction and compilation
//! - The database, collections and cursors
//! - Error types

pub use arangolayer_core::{
    aql::CompiledQuery,
    collection::Collection,
    config::ClientConfig,
    cursor::Cursor,
    database::Database,
    entity::{DocumentMeta, Endpoint, Entity, EntityState},
    error::{ApiError, ArangoError, ArangoResult, TransportError},
    expr::{Expr, Field, FieldOp, Filter, QueryVisitor},
    field::{DefaultValue, EpochMillis, FieldCodec, FieldDescriptor, FieldType, PrimitiveType},
    graph::{EdgeDefinition, GraphDefinition},
    page::{Page, PaginationParams},
    query::{Direction, Projection, Query, Sort, SortDirection, Traversal, TraversalTarget},
    record::Record,
    registry::SchemaRegistry,
    schema::{Schema, SchemaKind},
    transport::{Transport, TransportBuilder},
    value::FieldValue,
};
