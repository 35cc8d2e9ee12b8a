//! In-memory transport.
//!
//! [`MemoryTransport`] answers requests from an emulated server held in memory. It keeps
//! documents, collections, graphs, indexes and cursors, so CRUD and graph setup behave like a
//! real server. Query text is not evaluated: the rows of the next opened cursor are scripted
//! with [`MemoryTransport::push_results`].

use async_trait::async_trait;
use mea::rwlock::RwLock;
use serde_json::Value;
use std::sync::Arc;

use arangolayer_core::{
    error::{ArangoResult, TransportError},
    transport::{Request, Response, Transport, TransportBuilder},
};

use crate::server::Server;

const DEFAULT_DATABASE: &str = "_system";

/// Thread-safe in-memory transport.
///
/// Clones share the same server state, so a test can keep a handle for scripting and
/// inspection while a [`Database`](arangolayer_core::database::Database) owns another.
///
/// # Example
///
/// ```ignore
/// use arangolayer_memory::MemoryTransport;
///
/// let transport = MemoryTransport::builder().database("shop").build().await?;
/// transport.push_results(vec![json!({"_id": "users/1", "name": "Ann"})]).await;
/// ```
#[derive(Clone, Debug)]
pub struct MemoryTransport {
    server: Arc<RwLock<Server>>,
    database: String,
}

impl MemoryTransport {
    /// Creates a transport serving the `_system` database.
    pub fn new() -> Self {
        Self::with_databases(DEFAULT_DATABASE, Vec::new())
    }

    pub fn builder() -> MemoryTransportBuilder {
        MemoryTransportBuilder::default()
    }

    fn with_databases(database: &str, others: Vec<String>) -> Self {
        let databases = std::iter::once(database.to_string()).chain(others);
        Self {
            server: Arc::new(RwLock::new(Server::new(databases))),
            database: database.to_string(),
        }
    }

    /// Scripts the rows of the next cursor the client opens.
    pub async fn push_results(&self, rows: Vec<Value>) {
        self.server.write().await.script(rows, None);
    }

    /// Scripts the rows of the next cursor, reporting `full_count` as the row count without the
    /// query's last `LIMIT`.
    pub async fn push_results_with_full_count(&self, rows: Vec<Value>, full_count: u64) {
        self.server.write().await.script(rows, Some(full_count));
    }

    /// Makes the next request fail with `error` instead of reaching the server.
    pub async fn fail_next(&self, error: TransportError) {
        self.server.write().await.failures.push_back(error);
    }

    /// Every request executed so far, in order.
    pub async fn requests(&self) -> Vec<Request> {
        self.server.read().await.requests.clone()
    }

    /// A stored document of the default database, as the server holds it.
    pub async fn document(&self, collection: &str, key: &str) -> Option<Value> {
        self.server.read().await.document(&self.database, collection, key)
    }

    /// Number of server cursors that still have pending batches.
    pub async fn open_cursors(&self) -> usize {
        self.server.read().await.open_cursors()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn execute(&self, request: Request) -> Result<Response, TransportError> {
        let mut server = self.server.write().await;
        server.requests.push(request.clone());

        if let Some(error) = server.failures.pop_front() {
            tracing::debug!(method = %request.method, path = %request.path, %error, "injected failure");
            return Err(error);
        }

        let response = server.handle(&request);
        tracing::debug!(
            method = %request.method,
            path = %request.path,
            status = response.status,
            "handled request"
        );
        Ok(response)
    }
}

/// Builder for [`MemoryTransport`] instances.
///
/// ```ignore
/// let transport = MemoryTransport::builder().database("shop").build().await?;
/// ```
#[derive(Default, Debug)]
pub struct MemoryTransportBuilder {
    databases: Vec<String>,
}

impl MemoryTransportBuilder {
    /// Adds a database the server knows. The first one added is the default database used by
    /// [`MemoryTransport::document`]; without any, only `_system` exists.
    pub fn database(mut self, name: impl Into<String>) -> Self {
        self.databases.push(name.into());
        self
    }
}

#[async_trait]
impl TransportBuilder for MemoryTransportBuilder {
    type Transport = MemoryTransport;

    async fn build(self) -> ArangoResult<Self::Transport> {
        let mut databases = self.databases.into_iter();
        Ok(match databases.next() {
            Some(first) => MemoryTransport::with_databases(&first, databases.collect()),
            None => MemoryTransport::new(),
        })
    }
}
