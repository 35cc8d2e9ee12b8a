//! The transport capability the client calls into.
//!
//! The core never talks HTTP itself. It builds [`Request`] values addressed at the ArangoDB REST
//! API and hands them to a [`Transport`], which answers with a status code and a JSON body.
//! Connection pooling, authentication, timeouts and retries all belong to the transport.
//!
//! # Examples
//!
//! ```ignore
//! use arangolayer::transport::{Request, Transport, api_path};
//!
//! let path = api_path("_system", &["document", "users", "1"]);
//! let response = transport.execute(Request::get(path)).await?;
//! assert_eq!(response.status, 200);
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::{fmt::Debug, sync::Arc};

use crate::error::{ApiError, ArangoError, ArangoResult, TransportError};

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request against the REST API.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    /// Absolute, already encoded path, e.g. `/_db/_system/_api/document/users`.
    pub path: String,
    pub body: Option<Value>,
    /// Query string parameters, in the order they were added.
    pub query: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            query: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Returns the first query parameter named `name`.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// A response from the REST API.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    /// Response body; `Value::Null` when the server sent none.
    pub body: Value,
}

impl Response {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The ArangoDB error carried by a failed response.
    pub fn api_error(&self) -> ApiError {
        ApiError {
            code: self.status,
            error_num: self
                .body
                .get("errorNum")
                .and_then(Value::as_u64)
                .and_then(|num| u32::try_from(num).ok())
                .unwrap_or(0),
            message: self
                .body
                .get("errorMessage")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
        }
    }

    /// Returns the body of a successful response, or the API error of a failed one.
    pub fn into_body(self) -> Result<Value, TransportError> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(TransportError::Api(self.api_error()))
        }
    }
}

/// Executes requests against an ArangoDB server.
///
/// Implementations must be thread-safe; independent requests may be executed concurrently and
/// no ordering between them is assumed.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Executes a request.
    ///
    /// Error responses from the server are *not* errors at this level: they are returned as a
    /// [`Response`] with a non-2xx status. `Err` is reserved for failures to obtain a response
    /// at all.
    async fn execute(&self, request: Request) -> Result<Response, TransportError>;
}

#[async_trait]
impl<T> Transport for &T
where
    T: Transport + ?Sized,
{
    async fn execute(&self, request: Request) -> Result<Response, TransportError> {
        (**self).execute(request).await
    }
}

#[async_trait]
impl<T> Transport for Box<T>
where
    T: Transport + ?Sized,
{
    async fn execute(&self, request: Request) -> Result<Response, TransportError> {
        (**self).execute(request).await
    }
}

#[async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn execute(&self, request: Request) -> Result<Response, TransportError> {
        (**self).execute(request).await
    }
}

#[async_trait]
pub trait TransportBuilder {
    type Transport: Transport;

    async fn build(self) -> ArangoResult<Self::Transport>;
}

/// Percent-encodes one path segment.
pub fn encode_segment(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

/// Reverses [`encode_segment`]. Returns `None` for malformed escapes or invalid UTF-8.
pub fn decode_segment(segment: &str) -> Option<String> {
    let bytes = segment.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == b'%' {
            let hex = segment.get(index + 1..index + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            index += 3;
        } else {
            decoded.push(bytes[index]);
            index += 1;
        }
    }

    String::from_utf8(decoded).ok()
}

/// Builds the path of an API endpoint in `database`, encoding every segment.
pub fn api_path(database: &str, segments: &[&str]) -> String {
    let mut path = format!("/_db/{}/_api", encode_segment(database));
    for segment in segments {
        path.push('/');
        path.push_str(&encode_segment(segment));
    }
    path
}

/// Maps a response to the domain error taxonomy.
///
/// `what` names the addressed resource in the resulting error. 404 maps to
/// [`ArangoError::NotFound`], 412 or errorNum 1200 to [`ArangoError::Conflict`] (with the
/// revision the server reports), 409 with errorNum 1210 to [`ArangoError::AlreadyExists`], and
/// anything else that is not a success to [`ArangoError::Transport`].
pub(crate) fn check(response: Response, what: &str) -> ArangoResult<Value> {
    if response.is_success() {
        return Ok(response.body);
    }

    let api = response.api_error();
    let cause = Some(TransportError::Api(api.clone()));

    Err(match (api.code, api.error_num) {
        (404, _) => ArangoError::NotFound {
            what: what.to_string(),
            cause,
        },
        (412, _) | (_, 1200) => ArangoError::Conflict {
            id: what.to_string(),
            remote_rev: response
                .body
                .get("_rev")
                .and_then(Value::as_str)
                .map(str::to_string),
            cause,
        },
        (409, 1210) => ArangoError::AlreadyExists {
            what: what.to_string(),
            cause,
        },
        _ => ArangoError::Transport(TransportError::Api(api)),
    })
}

/// Sends a request and maps the response with [`check`].
pub(crate) async fn send<T: Transport + ?Sized>(
    transport: &T,
    request: Request,
    what: &str,
) -> ArangoResult<Value> {
    let response = transport.execute(request).await?;
    check(response, what)
}
