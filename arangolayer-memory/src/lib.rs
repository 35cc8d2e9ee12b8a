//! In-memory transport for arangolayer.
//!
//! This crate provides a thread-safe implementation of the `Transport` trait that emulates the
//! part of the ArangoDB REST API the client uses. It uses async-aware read-write locks for
//! concurrent access and is meant for development and tests.
//!
//! # Features
//!
//! - **Documents and edges** - Create, read, replace with revision checks, delete
//! - **Collections, graphs and indexes** - Setup endpoints with the server's error codes
//! - **Cursors** - Batched result delivery with continuation and early close
//! - **Scripting** - Query results and transport failures can be injected
//!
//! # Quick Start
//!
//! ```ignore
//! use arangolayer::{memory::MemoryTransport, prelude::*};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let users = Schema::document("users").build()?;
//!     let transport = MemoryTransport::builder().build().await?;
//!     let db = Database::new(transport.clone(), ClientConfig::default());
//!
//!     db.ensure_collection(&users).await?;
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as arangolayer_memory;

mod server;
pub mod transport;

pub use transport::{MemoryTransport, MemoryTransportBuilder};
