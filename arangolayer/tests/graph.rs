mod common;

use arangolayer::{memory::MemoryTransport, prelude::*, transport::Method};
use common::{accounts, database, knows, user, users};
use serde_json::json;

fn social() -> GraphDefinition {
    GraphDefinition::builder("social")
        .edge(&knows(), &[&users()], &[&users()])
        .vertex(&accounts())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_ensure_graph_creates_collections_once() {
    let transport = MemoryTransport::builder().build().await.unwrap();
    let db = Database::new(transport.clone(), ClientConfig::default());

    db.ensure_graph(&social()).await.unwrap();
    db.ensure_graph(&social()).await.unwrap();

    assert_eq!(db.list_collections().await.unwrap(), ["accounts", "knows", "users"]);
    let graph_creations = transport
        .requests()
        .await
        .iter()
        .filter(|request| request.method == Method::Post && request.path.ends_with("/_api/gharial"))
        .count();
    assert_eq!(graph_creations, 1);

    db.drop_graph("social", true).await.unwrap();
    assert!(db.list_collections().await.unwrap().is_empty());
    assert!(matches!(
        db.drop_graph("social", false).await,
        Err(ArangoError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_collection_type_mismatch() {
    let (db, _transport) = database(ClientConfig::default()).await;
    let edge_users = Schema::edge("users").build().unwrap();

    let err = db.ensure_collection(&edge_users).await.unwrap_err();

    assert!(matches!(
        err,
        ArangoError::CollectionType { ref expected, ref found, .. } if expected == "edge" && found == "document"
    ));
}

#[tokio::test]
async fn test_unresolved_endpoint_fails_before_sending() {
    let (db, transport) = database(ClientConfig::default()).await;
    let edges = db.collection(&knows());
    let ann = user("Ann", 30);
    let sent = transport.requests().await.len();

    let mut edge = Entity::new(&knows());
    edge.connect(&ann, "users/bob").unwrap();

    assert!(matches!(edge.dump(), Err(ArangoError::Reference(_))));
    assert!(matches!(edges.create(&mut edge).await, Err(ArangoError::Reference(_))));
    assert_eq!(edge.state(), EntityState::Unbound);
    assert_eq!(transport.requests().await.len(), sent);
}

#[tokio::test]
async fn test_edge_roundtrip() {
    let (db, _transport) = database(ClientConfig::default()).await;
    let people = db.collection(&users());
    let edges = db.collection(&knows());

    let mut ann = user("Ann", 30);
    let mut bob = user("Bob", 25);
    people.create(&mut ann).await.unwrap();
    people.create(&mut bob).await.unwrap();

    let mut edge = Entity::new(&knows());
    edge.connect(&ann, &bob).unwrap();
    edge.set("since", 2020).unwrap();
    edges.create(&mut edge).await.unwrap();

    let loaded = edges.get(edge.key().unwrap()).await.unwrap();
    assert_eq!(loaded.from().and_then(Endpoint::id), ann.id());
    assert_eq!(loaded.to().and_then(Endpoint::id), bob.id());
    assert_eq!(loaded.get("since").unwrap().and_then(FieldValue::as_i64), Some(2020));
}

#[tokio::test]
async fn test_connections_follow_one_edge() {
    let (db, transport) = database(ClientConfig::default()).await;
    let people = db.collection(&users());
    let edges = db.collection(&knows());
    let mut ann = user("Ann", 30);
    people.create(&mut ann).await.unwrap();
    let ann_id = ann.id().unwrap().to_string();

    transport
        .push_results(vec![json!({"_id": "users/2", "_key": "2", "_rev": "_a", "name": "Bob"})])
        .await;
    let bob = edges.outbounds(&ann).unwrap().first().await.unwrap().unwrap();
    assert_eq!(bob.id(), Some("users/2"));
    assert_eq!(bob.schema().name(), "users");

    let requests = transport.requests().await;
    let body = requests.last().unwrap().body.as_ref().unwrap();
    assert_eq!(
        body["query"],
        "FOR doc IN @@collection_0 FILTER doc.`_id` == @value_0 \
         FOR neighbour IN 1..1 OUTBOUND doc._id @@edges_0 RETURN neighbour"
    );
    assert_eq!(
        body["bindVars"],
        json!({"@collection_0": "users", "value_0": ann_id, "@edges_0": "knows"})
    );

    let inbound = edges.inbounds(&ann).unwrap().collect().await.unwrap();
    assert!(inbound.is_empty());
    let requests = transport.requests().await;
    let query = requests.last().unwrap().body.as_ref().unwrap()["query"].clone();
    assert!(query.as_str().unwrap().contains("1..1 INBOUND doc._id"));
}

#[tokio::test]
async fn test_connections_need_edges_and_a_stored_vertex() {
    let (db, transport) = database(ClientConfig::default()).await;
    let people = db.collection(&users());
    let edges = db.collection(&knows());
    let sent = transport.requests().await.len();

    let unbound = user("Bob", 25);
    assert!(matches!(
        edges.connections(&unbound, Direction::Any),
        Err(ArangoError::NotPersisted(_))
    ));
    assert!(matches!(
        people.connections(&unbound, Direction::Any),
        Err(ArangoError::Schema(_))
    ));
    assert_eq!(transport.requests().await.len(), sent);
}

#[tokio::test]
async fn test_endpoint_must_be_a_document_handle() {
    let (db, _transport) = database(ClientConfig::default()).await;
    let edges = db.collection(&knows());

    let mut edge = Entity::new(&knows());
    edge.connect("users/1", "not a handle").unwrap();

    assert!(matches!(edges.create(&mut edge).await, Err(ArangoError::Reference(_))));
}

#[tokio::test]
async fn test_traversal_query_loads_rows_by_collection() {
    let (mut db, transport) = database(ClientConfig::default()).await;
    assert!(matches!(db.register(&accounts()), Err(ArangoError::Schema(_))));
    transport
        .push_results(vec![
            json!({"_id": "users/2", "_key": "2", "_rev": "_a", "name": "Bob"}),
            json!({"_id": "knows/7", "_key": "7", "_rev": "_b", "_from": "users/1", "_to": "users/2", "since": 2020}),
            json!({"name": "Cy"}),
        ])
        .await;

    let query = Query::new(&users())
        .filter(Field::new("name").eq("Ann"))
        .unwrap()
        .traverse(
            Traversal::outbound(TraversalTarget::graph(&social()), "friend", &users())
                .with_edge("edge", &knows())
                .depth(1, 2),
        )
        .unwrap();
    let rows = db.query(&query).unwrap().collect().await.unwrap();

    let collections: Vec<&str> = rows.iter().map(|row| row.schema().name()).collect();
    assert_eq!(collections, ["users", "knows", "users"]);
    assert_eq!(rows[1].from().and_then(Endpoint::id), Some("users/1"));

    let requests = transport.requests().await;
    let body = requests.last().unwrap().body.as_ref().unwrap();
    assert_eq!(
        body["query"],
        "FOR doc IN @@collection_0 FILTER doc.`name` == @value_0 \
         FOR friend, edge IN 1..2 OUTBOUND doc._id GRAPH @graph_0 RETURN friend"
    );
    assert_eq!(
        body["bindVars"],
        json!({"@collection_0": "users", "value_0": "Ann", "graph_0": "social"})
    );
}

#[tokio::test]
async fn test_validate_and_raw_rows() {
    let (db, transport) = database(ClientConfig::default()).await;
    let query = Query::new(&users()).limit(1);

    db.validate(&query).await.unwrap();

    transport.push_results(vec![json!({"name": "Ann", "extra": true})]).await;
    let rows = db.query_json(&query).unwrap().collect().await.unwrap();
    assert_eq!(rows, [json!({"name": "Ann", "extra": true})]);
}
