mod common;

use arangolayer::{prelude::*, transport::Method};
use common::{accounts, age, database, user, users};
use futures::StreamExt;
use serde_json::json;

#[tokio::test]
async fn test_entity_lifecycle() {
    let (db, transport) = database(ClientConfig::default()).await;
    let collection = db.collection(&users());

    let mut ann = user("Ann", 30);
    assert_eq!(ann.state(), EntityState::Unbound);

    let meta = collection.create(&mut ann).await.unwrap();
    assert_eq!(ann.state(), EntityState::Persisted);
    assert_eq!(ann.key(), meta.key.as_deref());
    assert_eq!(ann.id(), Some(format!("users/{}", meta.key.clone().unwrap()).as_str()));
    assert!(ann.rev().is_some());

    ann.set("age", 31).unwrap();
    assert_eq!(ann.state(), EntityState::Stale);

    let created_rev = meta.rev.clone();
    let updated = collection.update(&mut ann).await.unwrap();
    assert_eq!(ann.state(), EntityState::Persisted);
    assert_ne!(updated.rev, created_rev);

    let key = ann.key().unwrap().to_string();
    let stored = transport.document("users", &key).await.unwrap();
    assert_eq!(stored["age"], 31);

    collection.delete(&mut ann).await.unwrap();
    assert_eq!(ann.state(), EntityState::Deleted);
    assert!(matches!(ann.get("name"), Err(ArangoError::EntityDeleted(_))));
    assert!(matches!(ann.set("age", 1), Err(ArangoError::EntityDeleted(_))));
    assert!(matches!(collection.delete(&mut ann).await, Err(ArangoError::EntityDeleted(_))));
    assert!(matches!(
        collection.get(&key).await,
        Err(ArangoError::NotFound { ref what, cause: Some(_) }) if *what == format!("users/{key}")
    ));
}

#[tokio::test]
async fn test_defaults_are_omitted_on_the_wire() {
    let (db, transport) = database(ClientConfig::default()).await;
    let collection = db.collection(&users());

    let mut ann = Entity::new(&users());
    ann.set("name", "Ann").unwrap();
    collection.create(&mut ann).await.unwrap();

    let stored = transport.document("users", ann.key().unwrap()).await.unwrap();
    assert_eq!(stored.get("age"), None);

    let loaded = collection.get(ann.key().unwrap()).await.unwrap();
    assert_eq!(age(&loaded), Some(0));
    assert_eq!(loaded.state(), EntityState::Persisted);
}

#[tokio::test]
async fn test_conflicting_update_leaves_entity_untouched() {
    let (db, _transport) = database(ClientConfig::default()).await;
    let collection = db.collection(&users());

    let mut original = user("Ann", 30);
    collection.create(&mut original).await.unwrap();
    let key = original.key().unwrap().to_string();

    let mut first = collection.get(&key).await.unwrap();
    let mut second = collection.get(&key).await.unwrap();

    first.set("age", 40).unwrap();
    let winner = collection.update(&mut first).await.unwrap();

    second.set("age", 50).unwrap();
    let before = second.clone();
    let err = collection.update(&mut second).await.unwrap_err();

    match &err {
        ArangoError::Conflict { id, remote_rev, .. } => {
            assert_eq!(id, &format!("users/{key}"));
            assert_eq!(remote_rev, &winner.rev);
        }
        other => panic!("expected a conflict, got {other:?}"),
    }
    assert!(matches!(
        err.transport_cause(),
        Some(TransportError::Api(ApiError { code: 412, error_num: 1200, .. }))
    ));
    assert_eq!(second, before);
    assert_eq!(second.state(), EntityState::Stale);
    assert_eq!(age(&second), Some(50));

    collection.refresh(&mut second).await.unwrap();
    assert_eq!(second.state(), EntityState::Persisted);
    assert_eq!(age(&second), Some(40));
    assert_eq!(second.rev(), winner.rev.as_deref());

    second.set("age", 50).unwrap();
    collection.update(&mut second).await.unwrap();
    assert_eq!(age(&collection.get(&key).await.unwrap()), Some(50));
}

#[tokio::test]
async fn test_computed_keys_and_duplicates() {
    let (db, _transport) = database(ClientConfig::default()).await;
    let collection = db.collection(&accounts());

    let mut account = Entity::new(&accounts());
    account.set("email", "ann@example.com").unwrap();
    let meta = collection.create(&mut account).await.unwrap();
    assert_eq!(meta.key.as_deref(), Some("ann@example.com"));

    let mut duplicate = Entity::new(&accounts());
    duplicate.set("email", "ann@example.com").unwrap();
    let err = collection.create(&mut duplicate).await.unwrap_err();
    assert!(matches!(err, ArangoError::AlreadyExists { cause: Some(_), .. }));
    assert_eq!(duplicate.state(), EntityState::Unbound);

    assert!(matches!(
        collection.create(&mut account).await,
        Err(ArangoError::AlreadyExists { cause: None, .. })
    ));
}

#[tokio::test]
async fn test_writes_need_identity_and_matching_schema() {
    let (db, transport) = database(ClientConfig::default()).await;
    let users_collection = db.collection(&users());
    let accounts_collection = db.collection(&accounts());
    let sent = transport.requests().await.len();

    let mut ann = user("Ann", 30);
    assert!(matches!(users_collection.update(&mut ann).await, Err(ArangoError::NotPersisted(_))));
    assert!(matches!(users_collection.refresh(&mut ann).await, Err(ArangoError::NotPersisted(_))));
    assert!(matches!(accounts_collection.create(&mut ann).await, Err(ArangoError::Schema(_))));
    assert_eq!(transport.requests().await.len(), sent);
}

#[tokio::test]
async fn test_transport_failures_are_wrapped() {
    let (db, transport) = database(ClientConfig::default()).await;
    let collection = db.collection(&users());

    transport
        .fail_next(TransportError::Connection("connection refused".to_string()))
        .await;
    let mut ann = user("Ann", 30);
    let err = collection.create(&mut ann).await.unwrap_err();

    assert!(matches!(err, ArangoError::Transport(TransportError::Connection(_))));
    assert_eq!(ann.state(), EntityState::Unbound);
}

#[tokio::test]
async fn test_query_sends_bind_parameters() {
    let (db, transport) = database(ClientConfig::default()).await;
    let collection = db.collection(&users());
    transport
        .push_results(vec![
            json!({"_id": "users/1", "_key": "1", "_rev": "_a", "name": "Ann", "age": 30}),
            json!({"_id": "users/2", "_key": "2", "_rev": "_b", "name": "Bob", "age": 20}),
        ])
        .await;

    let query = Query::new(&users())
        .filter(Field::new("age").gt(18))
        .unwrap()
        .sort("name", SortDirection::Asc)
        .unwrap()
        .limit(10);
    let found = collection.query(&query).unwrap().collect().await.unwrap();

    assert_eq!(found.len(), 2);
    assert_eq!(found[0].key(), Some("1"));
    assert_eq!(age(&found[1]), Some(20));
    assert!(found.iter().all(|entity| entity.state() == EntityState::Persisted));

    let requests = transport.requests().await;
    let opened = requests.last().unwrap();
    let body = opened.body.as_ref().unwrap();
    assert_eq!(opened.method, Method::Post);
    assert!(opened.path.ends_with("/_api/cursor"));
    assert_eq!(
        body["query"],
        "FOR doc IN @@collection_0 FILTER doc.`age` > @value_0 SORT doc.`name` ASC LIMIT @count_0 RETURN doc"
    );
    assert_eq!(body["bindVars"], json!({"@collection_0": "users", "value_0": 18, "count_0": 10}));
}

#[tokio::test]
async fn test_query_errors_surface_before_sending() {
    let (db, transport) = database(ClientConfig::default()).await;
    let collection = db.collection(&users());
    let sent = transport.requests().await.len();

    let unknown = Query::new(&users()).filter(Field::new("nickname").eq("x"));
    assert!(matches!(unknown, Err(ArangoError::UnknownField { .. })));

    let other = Query::new(&accounts());
    assert!(matches!(collection.query(&other), Err(ArangoError::UnsupportedQuery { .. })));
    assert_eq!(transport.requests().await.len(), sent);
}

#[tokio::test]
async fn test_cursor_is_lazy_and_batched() {
    let (db, transport) = database(ClientConfig::default().with_batch_size(2)).await;
    let collection = db.collection(&users());
    let rows = (1..=5)
        .map(|n| json!({"_id": format!("users/{n}"), "_key": n.to_string(), "_rev": "_r", "name": format!("user {n}")}))
        .collect();
    transport.push_results(rows).await;
    let sent = transport.requests().await.len();

    let cursor = collection.all().unwrap();
    assert_eq!(transport.requests().await.len(), sent);

    let names: Vec<String> = cursor
        .map(|entity| {
            let entity = entity.unwrap();
            entity.get("name").unwrap().and_then(FieldValue::as_str).unwrap().to_string()
        })
        .collect()
        .await;
    assert_eq!(names, ["user 1", "user 2", "user 3", "user 4", "user 5"]);

    let requests = transport.requests().await;
    let continuations = requests[sent..]
        .iter()
        .filter(|request| request.method == Method::Put && request.path.contains("/_api/cursor/"))
        .count();
    assert_eq!(requests.len() - sent, 3);
    assert_eq!(continuations, 2);
    assert_eq!(requests[sent].body.as_ref().unwrap()["batchSize"], 2);
}

#[tokio::test]
async fn test_cursor_close_releases_server_cursor() {
    let (db, transport) = database(ClientConfig::default().with_batch_size(2)).await;
    let collection = db.collection(&users());
    let rows = (1..=5)
        .map(|n| json!({"_id": format!("users/{n}"), "_key": n.to_string(), "name": "x"}))
        .collect();
    transport.push_results(rows).await;

    let mut cursor = collection.all().unwrap();
    assert!(cursor.next().await.unwrap().is_ok());
    assert_eq!(transport.open_cursors().await, 1);

    cursor.close().await.unwrap();
    assert_eq!(transport.open_cursors().await, 0);
}

#[tokio::test]
async fn test_first_returns_one_row_and_closes() {
    let (db, transport) = database(ClientConfig::default().with_batch_size(2)).await;
    let collection = db.collection(&users());
    let rows = (1..=5)
        .map(|n| json!({"_id": format!("users/{n}"), "_key": n.to_string(), "name": format!("u{n}")}))
        .collect();
    transport.push_results(rows).await;

    let first = collection.all().unwrap().first().await.unwrap().unwrap();

    assert_eq!(first.key(), Some("1"));
    assert_eq!(transport.open_cursors().await, 0);
    let last = transport.requests().await.pop().unwrap();
    assert_eq!(last.method, Method::Delete);

    let empty = collection.all().unwrap().first().await.unwrap();
    assert!(empty.is_none());
}

#[tokio::test]
async fn test_delete_after_another_writer_removed_the_document() {
    let (db, _transport) = database(ClientConfig::default()).await;
    let collection = db.collection(&users());
    let mut ann = user("Ann", 30);
    collection.create(&mut ann).await.unwrap();
    let key = ann.key().unwrap().to_string();

    let mut mine = collection.get(&key).await.unwrap();
    let mut theirs = collection.get(&key).await.unwrap();
    collection.delete(&mut theirs).await.unwrap();

    assert!(matches!(
        collection.delete(&mut mine).await,
        Err(ArangoError::NotFound { ref what, .. }) if *what == format!("users/{key}")
    ));
    assert_eq!(mine.state(), EntityState::Persisted);
}

#[tokio::test]
async fn test_bad_rows_fail_individually() {
    let (db, transport) = database(ClientConfig::default()).await;
    let collection = db.collection(&users());
    transport
        .push_results(vec![json!({"name": 5}), json!("scalar"), json!({"name": "Ann"})])
        .await;

    let results: Vec<_> = StreamExt::collect(collection.all().unwrap()).await;

    assert!(matches!(
        results[0],
        Err(ArangoError::Deserialization { ref field, ref got, .. }) if field == "name" && got == "integer"
    ));
    assert!(matches!(results[1], Err(ArangoError::Deserialization { .. })));
    assert!(results[2].is_ok());
}

#[tokio::test]
async fn test_page_uses_full_count() {
    let (db, transport) = database(ClientConfig::default()).await;
    let collection = db.collection(&users());
    transport
        .push_results_with_full_count(
            vec![json!({"name": "Cy"}), json!({"name": "Di"})],
            7,
        )
        .await;

    let query = Query::new(&users()).sort("name", SortDirection::Asc).unwrap();
    let page = collection.page(&query, PaginationParams::new(2, 2)).await.unwrap();

    assert_eq!(page.items.len(), 2);
    assert_eq!(page.count, 7);
    assert_eq!((page.previous_page, page.next_page), (Some(1), Some(3)));

    let requests = transport.requests().await;
    let body = requests.last().unwrap().body.as_ref().unwrap();
    assert_eq!(body["options"]["fullCount"], true);
    assert_eq!(body["bindVars"]["offset_0"], 2);
    assert_eq!(body["bindVars"]["count_0"], 2);
    assert!(body["query"].as_str().unwrap().ends_with("LIMIT @offset_0, @count_0 RETURN doc"));
}

#[tokio::test]
async fn test_ensure_index() {
    let (db, transport) = database(ClientConfig::default()).await;
    let collection = db.collection(&users());

    assert!(matches!(
        collection.ensure_index(&["nickname"], false).await,
        Err(ArangoError::UnknownField { .. })
    ));

    collection.ensure_index(&["email"], true).await.unwrap();
    collection.ensure_index(&["email"], true).await.unwrap();

    let index_requests = transport
        .requests()
        .await
        .into_iter()
        .filter(|request| request.path.ends_with("/_api/index"))
        .collect::<Vec<_>>();
    assert_eq!(index_requests.len(), 2);
    assert_eq!(index_requests[0].query_param("collection"), Some("users"));
}
