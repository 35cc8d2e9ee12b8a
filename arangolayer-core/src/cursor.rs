//! Lazy streaming of query results.
//!
//! A [`Cursor`] does nothing until it is first polled. It then opens a server cursor and yields
//! the rows of each batch, fetching the next batch only when the current one is exhausted. A
//! cursor is single-pass; running the query again means building a new cursor.
//!
//! ```ignore
//! use futures::StreamExt;
//!
//! let mut adults = users.query(&query)?;
//! while let Some(user) = adults.next().await {
//!     println!("{}", user?.handle());
//! }
//! ```

use futures::{Stream, StreamExt, future::BoxFuture};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::{
    collections::VecDeque,
    fmt,
    pin::Pin,
    task::{Context, Poll, ready},
};

use crate::{
    aql::CompiledQuery,
    config::ClientConfig,
    error::{ArangoError, ArangoResult},
    transport::{self, Request, Transport, api_path},
};

type Decoder<'a, T> = Box<dyn Fn(Value) -> ArangoResult<T> + Send + Sync + 'a>;

#[derive(Debug, Default, Deserialize)]
struct CursorStats {
    #[serde(rename = "fullCount")]
    full_count: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CursorExtra {
    #[serde(default)]
    stats: CursorStats,
}

/// One batch of a server cursor.
#[derive(Debug, Deserialize)]
struct CursorBatch {
    #[serde(default)]
    result: Vec<Value>,
    #[serde(default, rename = "hasMore")]
    has_more: bool,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    extra: CursorExtra,
}

/// Builds the request that opens a cursor for a compiled query.
pub(crate) fn open_request(config: &ClientConfig, query: &CompiledQuery, full_count: bool) -> Request {
    let mut body = Map::new();
    body.insert("query".to_string(), Value::from(query.text.as_str()));
    body.insert("bindVars".to_string(), Value::Object(query.bind_vars.clone()));
    body.insert("count".to_string(), Value::Bool(config.count));
    if let Some(batch_size) = config.batch_size {
        body.insert("batchSize".to_string(), Value::from(batch_size));
    }
    if let Some(ttl) = config.cursor_ttl {
        body.insert("ttl".to_string(), Value::from(ttl));
    }
    if full_count {
        body.insert("options".to_string(), json!({"fullCount": true}));
    }

    Request::post(api_path(&config.database, &["cursor"])).with_body(Value::Object(body))
}

/// A lazy, single-pass stream of query results.
pub struct Cursor<'a, T> {
    transport: &'a dyn Transport,
    database: String,
    decode: Decoder<'a, T>,
    initial: Option<Request>,
    pending: Option<BoxFuture<'a, ArangoResult<CursorBatch>>>,
    rows: VecDeque<Value>,
    id: Option<String>,
    has_more: bool,
    done: bool,
    count: Option<u64>,
    full_count: Option<u64>,
}

impl<'a, T> Cursor<'a, T> {
    /// Creates a cursor that sends `request` on first poll and decodes every row with `decode`.
    pub fn new<F>(transport: &'a dyn Transport, database: &str, request: Request, decode: F) -> Self
    where
        F: Fn(Value) -> ArangoResult<T> + Send + Sync + 'a,
    {
        Self {
            transport,
            database: database.to_string(),
            decode: Box::new(decode),
            initial: Some(request),
            pending: None,
            rows: VecDeque::new(),
            id: None,
            has_more: false,
            done: false,
            count: None,
            full_count: None,
        }
    }

    /// Total number of rows, if the cursor was opened with counting enabled and the first
    /// batch has arrived.
    pub fn count(&self) -> Option<u64> {
        self.count
    }

    /// Rows the query would have produced without its last `LIMIT`, if requested.
    pub fn full_count(&self) -> Option<u64> {
        self.full_count
    }

    /// Drains the cursor into a vector, stopping at the first error.
    pub async fn collect(mut self) -> ArangoResult<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await {
            items.push(item?);
        }
        Ok(items)
    }

    /// Returns the first row and closes the cursor.
    pub async fn first(mut self) -> ArangoResult<Option<T>> {
        let first = self.next().await.transpose();
        self.close().await?;
        first
    }

    /// Discards the cursor, releasing the server cursor if batches are still pending.
    pub async fn close(self) -> ArangoResult<()> {
        let (true, Some(id)) = (self.has_more, self.id) else {
            return Ok(());
        };

        tracing::debug!(cursor = %id, "closing cursor");
        let request = Request::delete(api_path(&self.database, &["cursor", &id]));
        match transport::send(self.transport, request, &format!("cursor {id}")).await {
            Ok(_) | Err(ArangoError::NotFound { .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn fetch(&self, request: Request) -> BoxFuture<'a, ArangoResult<CursorBatch>> {
        let transport = self.transport;
        Box::pin(async move {
            let body = transport::send(transport, request, "cursor").await?;
            Ok(serde_json::from_value(body)?)
        })
    }

    fn absorb(&mut self, batch: CursorBatch) {
        self.rows.extend(batch.result);
        self.has_more = batch.has_more;
        self.id = if batch.has_more { batch.id } else { None };
        self.count = batch.count.or(self.count);
        self.full_count = batch.extra.stats.full_count.or(self.full_count);
    }
}

impl<T> Stream for Cursor<'_, T> {
    type Item = ArangoResult<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(row) = this.rows.pop_front() {
                return Poll::Ready(Some((this.decode)(row)));
            }

            if let Some(pending) = this.pending.as_mut() {
                let result = ready!(pending.as_mut().poll(cx));
                this.pending = None;
                match result {
                    Ok(batch) => this.absorb(batch),
                    Err(err) => {
                        this.done = true;
                        return Poll::Ready(Some(Err(err)));
                    }
                }
                continue;
            }

            if this.done {
                return Poll::Ready(None);
            }

            if let Some(request) = this.initial.take() {
                this.pending = Some(this.fetch(request));
                continue;
            }

            match (this.has_more, this.id.as_deref()) {
                (true, Some(id)) => {
                    tracing::debug!(cursor = %id, "fetching next batch");
                    let request = Request::put(api_path(&this.database, &["cursor", id]));
                    this.pending = Some(this.fetch(request));
                }
                _ => {
                    this.done = true;
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl<T> fmt::Debug for Cursor<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("database", &self.database)
            .field("id", &self.id)
            .field("buffered", &self.rows.len())
            .field("has_more", &self.has_more)
            .field("done", &self.done)
            .finish()
    }
}
