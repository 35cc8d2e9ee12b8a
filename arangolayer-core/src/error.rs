//! Error types and result types for mapping, query and collection operations.
//!
//! Every fallible operation in this crate returns [`ArangoResult<T>`]. Callers are expected to
//! branch on the [`ArangoError`] variant (the domain kind) rather than on transport details.
//! When an error originates from a server response, the underlying [`TransportError`] is kept
//! as the error's source so it can still be inspected.

use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Error reported by the server in an ArangoDB error body.
///
/// ArangoDB answers failed requests with a JSON body of the form
/// `{"error": true, "code": 404, "errorNum": 1202, "errorMessage": "document not found"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status code of the response.
    pub code: u16,
    /// ArangoDB specific error number.
    pub error_num: u32,
    /// Human readable message supplied by the server.
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[HTTP {}][ERR {}] {}", self.code, self.error_num, self.message)
    }
}

/// Failures raised by the transport collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The connection to the server could not be established or was lost.
    #[error("Connection error: {0}")]
    Connection(String),
    /// The request did not complete in time.
    #[error("Request timed out: {0}")]
    Timeout(String),
    /// The server answered with an error body.
    #[error("API error: {0}")]
    Api(ApiError),
    /// The server answered with something that is not a valid response for the request.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Represents all errors surfaced by schema, entity, query and collection operations.
#[derive(Error, Debug)]
pub enum ArangoError {
    /// A required field was absent from a raw record.
    #[error("Missing required field `{0}`")]
    MissingField(String),
    /// A field value did not have the type its descriptor declares.
    #[error("Invalid value for field `{field}`: expected {expected}, got {got}")]
    Deserialization {
        /// Name of the offending field.
        field: String,
        /// Type the descriptor declares.
        expected: String,
        /// Type that was actually found.
        got: String,
    },
    /// A field name or path is not declared by the schema it was resolved against.
    #[error("Unknown field `{field}` in {scope}")]
    UnknownField {
        /// The unresolved field name or path.
        field: String,
        /// Schema or alias the field was resolved against.
        scope: String,
    },
    /// An edge endpoint does not reference a persisted document.
    #[error("Invalid reference: {0}")]
    Reference(String),
    /// The server revision differs from the last revision known to the client.
    #[error("Conflict on {id}: remote revision is {}", remote_rev.as_deref().unwrap_or("unknown"))]
    Conflict {
        /// Document handle the write targeted.
        id: String,
        /// Revision currently stored on the server, if it was reported.
        remote_rev: Option<String>,
        #[source]
        cause: Option<TransportError>,
    },
    /// The addressed document, collection, graph or cursor does not exist.
    #[error("Not found: {what}")]
    NotFound {
        /// Description of what was looked up.
        what: String,
        #[source]
        cause: Option<TransportError>,
    },
    /// A document with the same key or unique attribute already exists.
    #[error("Already exists: {what}")]
    AlreadyExists {
        /// Description of the conflicting write.
        what: String,
        #[source]
        cause: Option<TransportError>,
    },
    /// The query tree cannot be lowered to a query string.
    #[error("Unsupported query at {node}: {reason}")]
    UnsupportedQuery {
        /// Kind of the offending node.
        node: String,
        /// Why the node cannot be compiled.
        reason: String,
    },
    /// The entity was deleted and can no longer be read or written.
    #[error("Entity {0} has been deleted")]
    EntityDeleted(String),
    /// The entity has no server identity yet.
    #[error("Entity of {0} has not been persisted")]
    NotPersisted(String),
    /// A schema, graph or registry declaration is invalid.
    #[error("Schema error: {0}")]
    Schema(String),
    /// An existing collection has a different type than the schema requires.
    #[error("Collection {collection} is a {found} collection, expected {expected}")]
    CollectionType {
        collection: String,
        expected: String,
        found: String,
    },
    /// A record names a collection that has no registered schema.
    #[error("No schema registered for collection {0}")]
    UnknownCollection(String),
    /// JSON encoding or decoding failed outside of schema validation.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The transport failed and the failure does not map to a domain error.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A specialized `Result` type for this crate.
pub type ArangoResult<T> = Result<T, ArangoError>;

impl ArangoError {
    pub(crate) fn deserialization(
        field: impl Into<String>,
        expected: impl Into<String>,
        got: impl Into<String>,
    ) -> Self {
        ArangoError::Deserialization {
            field: field.into(),
            expected: expected.into(),
            got: got.into(),
        }
    }

    pub(crate) fn unknown_field(field: impl Into<String>, scope: impl Into<String>) -> Self {
        ArangoError::UnknownField {
            field: field.into(),
            scope: scope.into(),
        }
    }

    pub(crate) fn unsupported(node: impl Into<String>, reason: impl Into<String>) -> Self {
        ArangoError::UnsupportedQuery {
            node: node.into(),
            reason: reason.into(),
        }
    }

    /// Returns the transport failure this error wraps, if any.
    pub fn transport_cause(&self) -> Option<&TransportError> {
        match self {
            ArangoError::Conflict { cause, .. }
            | ArangoError::NotFound { cause, .. }
            | ArangoError::AlreadyExists { cause, .. } => cause.as_ref(),
            ArangoError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SerdeJsonError> for ArangoError {
    fn from(err: SerdeJsonError) -> Self {
        ArangoError::Serialization(err.to_string())
    }
}
