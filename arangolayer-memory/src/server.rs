//! The emulated server behind [`MemoryTransport`](crate::MemoryTransport).
//!
//! Requests are routed by method and decoded path segments. Every handler answers the way an
//! ArangoDB server would for the subset of the API the client uses, including its error
//! bodies (`{"error": true, "code": .., "errorNum": .., "errorMessage": ..}`).

use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, VecDeque};
use uuid::Uuid;

use arangolayer_core::{
    error::TransportError,
    transport::{Method, Request, Response, decode_segment},
};

const DEFAULT_BATCH_SIZE: usize = 1000;

const ERROR_HTTP_NOT_FOUND: u32 = 404;
const ERROR_BAD_PARAMETER: u32 = 10;
const ERROR_CONFLICT: u32 = 1200;
const ERROR_DOCUMENT_NOT_FOUND: u32 = 1202;
const ERROR_COLLECTION_NOT_FOUND: u32 = 1203;
const ERROR_DUPLICATE_NAME: u32 = 1207;
const ERROR_UNIQUE_CONSTRAINT: u32 = 1210;
const ERROR_DOCUMENT_TYPE_INVALID: u32 = 1227;
const ERROR_DATABASE_NOT_FOUND: u32 = 1228;
const ERROR_INVALID_EDGE_ATTRIBUTE: u32 = 1233;
const ERROR_QUERY_PARSE: u32 = 1501;
const ERROR_CURSOR_NOT_FOUND: u32 = 1600;
const ERROR_GRAPH_NOT_FOUND: u32 = 1924;
const ERROR_GRAPH_DUPLICATE: u32 = 1925;

/// Rows the next opened cursor yields.
#[derive(Debug)]
struct ScriptedResult {
    rows: Vec<Value>,
    full_count: Option<u64>,
}

#[derive(Debug)]
struct StoredCollection {
    collection_type: u8,
    is_system: bool,
    documents: BTreeMap<String, Map<String, Value>>,
    indexes: Vec<Value>,
}

impl StoredCollection {
    fn new(collection_type: u8, is_system: bool) -> Self {
        Self {
            collection_type,
            is_system,
            documents: BTreeMap::new(),
            indexes: Vec::new(),
        }
    }

    fn describe(&self, name: &str) -> Value {
        json!({"name": name, "type": self.collection_type, "isSystem": self.is_system, "status": 3})
    }
}

#[derive(Debug, Default)]
struct StoredDatabase {
    collections: BTreeMap<String, StoredCollection>,
    graphs: BTreeMap<String, Value>,
    next_key: u64,
}

impl StoredDatabase {
    fn new() -> Self {
        let mut database = Self::default();
        database
            .collections
            .insert("_graphs".to_string(), StoredCollection::new(2, true));
        database
    }
}

#[derive(Debug)]
struct OpenCursor {
    rows: VecDeque<Value>,
    batch_size: usize,
}

/// Complete server state; guarded by the transport's lock.
#[derive(Debug, Default)]
pub(crate) struct Server {
    databases: BTreeMap<String, StoredDatabase>,
    cursors: BTreeMap<String, OpenCursor>,
    next_cursor: u64,
    scripted: VecDeque<ScriptedResult>,
    pub(crate) failures: VecDeque<TransportError>,
    pub(crate) requests: Vec<Request>,
}

impl Server {
    pub(crate) fn new<I: IntoIterator<Item = String>>(databases: I) -> Self {
        Self {
            databases: databases
                .into_iter()
                .map(|name| (name, StoredDatabase::new()))
                .collect(),
            ..Self::default()
        }
    }

    pub(crate) fn script(&mut self, rows: Vec<Value>, full_count: Option<u64>) {
        self.scripted.push_back(ScriptedResult { rows, full_count });
    }

    pub(crate) fn document(&self, database: &str, collection: &str, key: &str) -> Option<Value> {
        self.databases
            .get(database)?
            .collections
            .get(collection)?
            .documents
            .get(key)
            .cloned()
            .map(Value::Object)
    }

    pub(crate) fn open_cursors(&self) -> usize {
        self.cursors.len()
    }

    pub(crate) fn handle(&mut self, request: &Request) -> Response {
        let Some((database, segments)) = parse_path(&request.path) else {
            return error(404, ERROR_HTTP_NOT_FOUND, "unknown path");
        };
        if !self.databases.contains_key(&database) {
            return error(404, ERROR_DATABASE_NOT_FOUND, "database not found");
        }
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        let body = request.body.as_ref();

        match (request.method, segments.as_slice()) {
            (Method::Post, ["document", collection]) => self.create_document(&database, collection, body),
            (Method::Get, ["document", collection, key]) => self.read_document(&database, collection, key),
            (Method::Put, ["document", collection, key]) => {
                let check_rev = request.query_param("ignoreRevs") == Some("false");
                self.replace_document(&database, collection, key, body, check_rev)
            }
            (Method::Delete, ["document", collection, key]) => self.delete_document(&database, collection, key),
            (Method::Post, ["cursor"]) => self.open_cursor(&database, body),
            (Method::Put | Method::Post, ["cursor", id]) => self.next_batch(id),
            (Method::Delete, ["cursor", id]) => match self.cursors.remove(*id) {
                Some(_) => Response::new(202, json!({"id": id, "error": false, "code": 202})),
                None => error(404, ERROR_CURSOR_NOT_FOUND, "cursor not found"),
            },
            (Method::Get, ["collection"]) => {
                let exclude_system = request.query_param("excludeSystem") == Some("true");
                self.list_collections(&database, exclude_system)
            }
            (Method::Post, ["collection"]) => self.create_collection(&database, body),
            (Method::Get, ["collection", name]) => match self.db(&database).collections.get(*name) {
                Some(collection) => Response::new(200, collection.describe(name)),
                None => error(404, ERROR_COLLECTION_NOT_FOUND, "collection or view not found"),
            },
            (Method::Delete, ["collection", name]) => match self.db_mut(&database).collections.remove(*name) {
                Some(_) => Response::new(200, json!({"id": name, "error": false, "code": 200})),
                None => error(404, ERROR_COLLECTION_NOT_FOUND, "collection or view not found"),
            },
            (Method::Post, ["gharial"]) => self.create_graph(&database, body),
            (Method::Get, ["gharial", name]) => match self.db(&database).graphs.get(*name) {
                Some(graph) => Response::new(200, json!({"graph": graph})),
                None => error(404, ERROR_GRAPH_NOT_FOUND, "graph not found"),
            },
            (Method::Delete, ["gharial", name]) => {
                let drop_collections = request.query_param("dropCollections") == Some("true");
                self.drop_graph(&database, name, drop_collections)
            }
            (Method::Post, ["query"]) => parse_query(body),
            (Method::Post, ["index"]) => match request.query_param("collection") {
                Some(collection) => self.ensure_index(&database, collection, body),
                None => error(400, ERROR_BAD_PARAMETER, "collection parameter missing"),
            },
            _ => error(404, ERROR_HTTP_NOT_FOUND, "unknown path"),
        }
    }

    fn db(&self, name: &str) -> &StoredDatabase {
        static MISSING: StoredDatabase = StoredDatabase {
            collections: BTreeMap::new(),
            graphs: BTreeMap::new(),
            next_key: 0,
        };
        self.databases.get(name).unwrap_or(&MISSING)
    }

    fn db_mut(&mut self, name: &str) -> &mut StoredDatabase {
        self.databases.entry(name.to_string()).or_default()
    }

    fn create_document(&mut self, database: &str, collection: &str, body: Option<&Value>) -> Response {
        let Some(Value::Object(body)) = body else {
            return error(400, ERROR_DOCUMENT_TYPE_INVALID, "invalid document type");
        };
        let db = self.db_mut(database);
        let Some(stored) = db.collections.get(collection) else {
            return error(404, ERROR_COLLECTION_NOT_FOUND, "collection or view not found");
        };
        if let Some(response) = check_edge(stored.collection_type, body) {
            return response;
        }

        let key = match body.get("_key") {
            Some(Value::String(key)) if !key.is_empty() => key.clone(),
            Some(_) => return error(400, ERROR_DOCUMENT_TYPE_INVALID, "invalid document key"),
            None => loop {
                db.next_key += 1;
                let key = db.next_key.to_string();
                if !stored.documents.contains_key(&key) {
                    break key;
                }
            },
        };
        if stored.documents.contains_key(&key) {
            return error(409, ERROR_UNIQUE_CONSTRAINT, "unique constraint violated");
        }

        let document = with_identity(body, collection, &key, &new_rev());
        let identity = identity_of(&document);
        if let Some(stored) = db.collections.get_mut(collection) {
            stored.documents.insert(key, document);
        }
        Response::new(201, identity)
    }

    fn read_document(&self, database: &str, collection: &str, key: &str) -> Response {
        let Some(stored) = self.db(database).collections.get(collection) else {
            return error(404, ERROR_COLLECTION_NOT_FOUND, "collection or view not found");
        };
        match stored.documents.get(key) {
            Some(document) => Response::new(200, Value::Object(document.clone())),
            None => error(404, ERROR_DOCUMENT_NOT_FOUND, "document not found"),
        }
    }

    fn replace_document(
        &mut self,
        database: &str,
        collection: &str,
        key: &str,
        body: Option<&Value>,
        check_rev: bool,
    ) -> Response {
        let Some(Value::Object(body)) = body else {
            return error(400, ERROR_DOCUMENT_TYPE_INVALID, "invalid document type");
        };
        let Some(stored) = self.db_mut(database).collections.get_mut(collection) else {
            return error(404, ERROR_COLLECTION_NOT_FOUND, "collection or view not found");
        };
        if let Some(response) = check_edge(stored.collection_type, body) {
            return response;
        }
        let Some(current) = stored.documents.get(key) else {
            return error(404, ERROR_DOCUMENT_NOT_FOUND, "document not found");
        };

        let old_rev = current.get("_rev").cloned().unwrap_or(Value::Null);
        if check_rev {
            if let Some(expected) = body.get("_rev") {
                if *expected != old_rev {
                    let mut response = error(412, ERROR_CONFLICT, "conflict, _rev values do not match");
                    if let Value::Object(response_body) = &mut response.body {
                        response_body.extend(identity_of(current).as_object().cloned().unwrap_or_default());
                    }
                    return response;
                }
            }
        }

        let document = with_identity(body, collection, key, &new_rev());
        let mut identity = identity_of(&document);
        if let Value::Object(identity) = &mut identity {
            identity.insert("_oldRev".to_string(), old_rev);
        }
        stored.documents.insert(key.to_string(), document);
        Response::new(201, identity)
    }

    fn delete_document(&mut self, database: &str, collection: &str, key: &str) -> Response {
        let Some(stored) = self.db_mut(database).collections.get_mut(collection) else {
            return error(404, ERROR_COLLECTION_NOT_FOUND, "collection or view not found");
        };
        match stored.documents.remove(key) {
            Some(document) => Response::new(200, identity_of(&document)),
            None => error(404, ERROR_DOCUMENT_NOT_FOUND, "document not found"),
        }
    }

    fn open_cursor(&mut self, database: &str, body: Option<&Value>) -> Response {
        let Some(body) = body.and_then(Value::as_object) else {
            return error(400, ERROR_BAD_PARAMETER, "expecting JSON object body");
        };
        if body.get("query").and_then(Value::as_str).is_none_or(str::is_empty) {
            return error(400, ERROR_QUERY_PARSE, "query is empty");
        }

        // Collection bind parameters must name existing collections.
        let bind_vars = body.get("bindVars").and_then(Value::as_object);
        for (name, value) in bind_vars.into_iter().flatten() {
            if name.starts_with('@') {
                let exists = value
                    .as_str()
                    .is_some_and(|collection| self.db(database).collections.contains_key(collection));
                if !exists {
                    return error(404, ERROR_COLLECTION_NOT_FOUND, "collection or view not found");
                }
            }
        }

        let script = self.scripted.pop_front().unwrap_or(ScriptedResult {
            rows: Vec::new(),
            full_count: None,
        });
        let total = script.rows.len() as u64;
        let batch_size = body
            .get("batchSize")
            .and_then(Value::as_u64)
            .map_or(DEFAULT_BATCH_SIZE, |size| size.max(1) as usize);
        let mut cursor = OpenCursor {
            rows: script.rows.into(),
            batch_size,
        };

        let mut response = Map::new();
        response.insert("result".to_string(), Value::Array(take_batch(&mut cursor)));
        response.insert("hasMore".to_string(), Value::Bool(!cursor.rows.is_empty()));
        if body.get("count").and_then(Value::as_bool).unwrap_or(false) {
            response.insert("count".to_string(), Value::from(total));
        }
        let full_count = body
            .get("options")
            .and_then(|options| options.get("fullCount"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let stats = match full_count {
            true => json!({"fullCount": script.full_count.unwrap_or(total)}),
            false => json!({}),
        };
        response.insert("extra".to_string(), json!({"stats": stats}));

        if !cursor.rows.is_empty() {
            self.next_cursor += 1;
            let id = self.next_cursor.to_string();
            response.insert("id".to_string(), Value::from(id.as_str()));
            self.cursors.insert(id, cursor);
        }
        Response::new(201, Value::Object(response))
    }

    fn next_batch(&mut self, id: &str) -> Response {
        let Some(cursor) = self.cursors.get_mut(id) else {
            return error(404, ERROR_CURSOR_NOT_FOUND, "cursor not found");
        };
        let result = take_batch(cursor);
        let has_more = !cursor.rows.is_empty();
        if !has_more {
            self.cursors.remove(id);
        }
        Response::new(200, json!({"result": result, "hasMore": has_more, "id": id}))
    }

    fn list_collections(&self, database: &str, exclude_system: bool) -> Response {
        let result: Vec<Value> = self
            .db(database)
            .collections
            .iter()
            .filter(|(_, collection)| !(exclude_system && collection.is_system))
            .map(|(name, collection)| collection.describe(name))
            .collect();
        Response::new(200, json!({"result": result, "error": false, "code": 200}))
    }

    fn create_collection(&mut self, database: &str, body: Option<&Value>) -> Response {
        let name = body.and_then(|body| body.get("name")).and_then(Value::as_str);
        let collection_type = body
            .and_then(|body| body.get("type"))
            .and_then(Value::as_u64)
            .unwrap_or(2);
        let (Some(name), 2 | 3) = (name, collection_type) else {
            return error(400, ERROR_BAD_PARAMETER, "invalid collection definition");
        };

        let db = self.db_mut(database);
        if db.collections.contains_key(name) {
            return error(409, ERROR_DUPLICATE_NAME, "duplicate name");
        }
        let collection = StoredCollection::new(collection_type as u8, name.starts_with('_'));
        let described = collection.describe(name);
        db.collections.insert(name.to_string(), collection);
        Response::new(200, described)
    }

    fn create_graph(&mut self, database: &str, body: Option<&Value>) -> Response {
        let Some(name) = body.and_then(|body| body.get("name")).and_then(Value::as_str) else {
            return error(400, ERROR_BAD_PARAMETER, "graph name missing");
        };
        let Some(graph) = body.cloned() else {
            return error(400, ERROR_BAD_PARAMETER, "graph definition missing");
        };
        let db = self.db_mut(database);
        if db.graphs.contains_key(name) {
            return error(409, ERROR_GRAPH_DUPLICATE, "graph already exists");
        }

        for (collection, collection_type) in graph_collections(&graph) {
            db.collections
                .entry(collection)
                .or_insert_with(|| StoredCollection::new(collection_type, false));
        }
        db.graphs.insert(name.to_string(), graph.clone());
        Response::new(202, json!({"graph": graph}))
    }

    fn drop_graph(&mut self, database: &str, name: &str, drop_collections: bool) -> Response {
        let db = self.db_mut(database);
        let Some(graph) = db.graphs.remove(name) else {
            return error(404, ERROR_GRAPH_NOT_FOUND, "graph not found");
        };

        if drop_collections {
            let still_used: Vec<String> = db
                .graphs
                .values()
                .flat_map(graph_collections)
                .map(|(collection, _)| collection)
                .collect();
            for (collection, _) in graph_collections(&graph) {
                if !still_used.contains(&collection) {
                    db.collections.remove(&collection);
                }
            }
        }
        Response::new(202, json!({"removed": true}))
    }

    fn ensure_index(&mut self, database: &str, collection: &str, body: Option<&Value>) -> Response {
        let Some(definition) = body.and_then(Value::as_object) else {
            return error(400, ERROR_BAD_PARAMETER, "invalid index definition");
        };
        let Some(stored) = self.db_mut(database).collections.get_mut(collection) else {
            return error(404, ERROR_COLLECTION_NOT_FOUND, "collection or view not found");
        };

        let same = |index: &&Value| {
            ["type", "fields", "unique"]
                .iter()
                .all(|attribute| index.get(attribute) == definition.get(*attribute))
        };
        if let Some(existing) = stored.indexes.iter().find(same) {
            let mut existing = existing.clone();
            if let Value::Object(existing) = &mut existing {
                existing.insert("isNewlyCreated".to_string(), Value::Bool(false));
            }
            return Response::new(200, existing);
        }

        let mut index = definition.clone();
        index.insert(
            "id".to_string(),
            Value::from(format!("{collection}/{}", stored.indexes.len() + 1)),
        );
        stored.indexes.push(Value::Object(index.clone()));
        index.insert("isNewlyCreated".to_string(), Value::Bool(true));
        Response::new(201, Value::Object(index))
    }
}

/// Splits `/_db/{database}/_api/{segments..}` into the decoded database name and segments.
fn parse_path(path: &str) -> Option<(String, Vec<String>)> {
    let rest = path.strip_prefix("/_db/")?;
    let mut parts = rest.split('/');
    let database = decode_segment(parts.next()?)?;
    if parts.next()? != "_api" {
        return None;
    }
    let segments = parts.map(decode_segment).collect::<Option<Vec<_>>>()?;
    Some((database, segments))
}

fn parse_query(body: Option<&Value>) -> Response {
    let text = body
        .and_then(|body| body.get("query"))
        .and_then(Value::as_str)
        .unwrap_or("");
    if text.trim().is_empty() || !text.contains("RETURN") {
        return error(400, ERROR_QUERY_PARSE, "syntax error, unexpected end of query string");
    }

    let mut bind_vars: Vec<String> = text
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '@'))
        .filter_map(|token| token.strip_prefix('@'))
        .map(str::to_string)
        .collect();
    bind_vars.sort();
    bind_vars.dedup();
    Response::new(200, json!({"parsed": true, "bindVars": bind_vars, "error": false, "code": 200}))
}

fn error(status: u16, error_num: u32, message: &str) -> Response {
    Response::new(
        status,
        json!({"error": true, "code": status, "errorNum": error_num, "errorMessage": message}),
    )
}

fn new_rev() -> String {
    let mut rev = Uuid::new_v4().simple().to_string();
    rev.truncate(11);
    format!("_{rev}")
}

fn with_identity(body: &Map<String, Value>, collection: &str, key: &str, rev: &str) -> Map<String, Value> {
    let mut document = body.clone();
    document.insert("_key".to_string(), Value::from(key));
    document.insert("_id".to_string(), Value::from(format!("{collection}/{key}")));
    document.insert("_rev".to_string(), Value::from(rev));
    document
}

fn identity_of(document: &Map<String, Value>) -> Value {
    let mut identity = Map::new();
    for attribute in ["_id", "_key", "_rev"] {
        if let Some(value) = document.get(attribute) {
            identity.insert(attribute.to_string(), value.clone());
        }
    }
    Value::Object(identity)
}

fn check_edge(collection_type: u8, body: &Map<String, Value>) -> Option<Response> {
    if collection_type != 3 {
        return None;
    }
    let valid = |attribute: &str| {
        body.get(attribute)
            .and_then(Value::as_str)
            .and_then(|handle| handle.split_once('/'))
            .is_some_and(|(collection, key)| !collection.is_empty() && !key.is_empty())
    };
    match valid("_from") && valid("_to") {
        true => None,
        false => Some(error(400, ERROR_INVALID_EDGE_ATTRIBUTE, "edge attribute missing or invalid")),
    }
}

/// Every collection a graph definition uses, with the type it must have.
fn graph_collections(graph: &Value) -> Vec<(String, u8)> {
    let names = |value: Option<&Value>| -> Vec<String> {
        value
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default()
    };

    let mut collections = Vec::new();
    for definition in graph.get("edgeDefinitions").and_then(Value::as_array).into_iter().flatten() {
        if let Some(edge) = definition.get("collection").and_then(Value::as_str) {
            collections.push((edge.to_string(), 3));
        }
        for vertex in names(definition.get("from")).into_iter().chain(names(definition.get("to"))) {
            collections.push((vertex, 2));
        }
    }
    for orphan in names(graph.get("orphanCollections")) {
        collections.push((orphan, 2));
    }
    collections
}

fn take_batch(cursor: &mut OpenCursor) -> Vec<Value> {
    let size = cursor.batch_size.min(cursor.rows.len());
    cursor.rows.drain(..size).collect()
}
