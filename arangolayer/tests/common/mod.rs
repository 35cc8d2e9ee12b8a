#![allow(dead_code)]

use std::sync::Arc;

use arangolayer::{memory::MemoryTransport, prelude::*};

pub fn users() -> Arc<Schema> {
    Schema::document("users")
        .field(FieldDescriptor::new("name", FieldType::string()).required())
        .field(FieldDescriptor::new("age", FieldType::int()).with_default(0).omit_on_default())
        .field(FieldDescriptor::new("email", FieldType::string()))
        .build()
        .unwrap()
}

pub fn accounts() -> Arc<Schema> {
    Schema::document("accounts")
        .field(FieldDescriptor::new("email", FieldType::string()).required())
        .key(["email"])
        .build()
        .unwrap()
}

pub fn knows() -> Arc<Schema> {
    Schema::edge("knows")
        .field(FieldDescriptor::new("since", FieldType::int()))
        .build()
        .unwrap()
}

/// A database over a fresh in-memory server, plus a handle on the same server.
pub async fn database(config: ClientConfig) -> (Database<MemoryTransport>, MemoryTransport) {
    let transport = MemoryTransport::builder()
        .database(config.database.clone())
        .build()
        .await
        .unwrap();
    let mut db = Database::new(transport.clone(), config);

    for schema in [users(), accounts(), knows()] {
        db.register(&schema).unwrap();
        db.ensure_collection(&schema).await.unwrap();
    }
    (db, transport)
}

pub fn user(name: &str, age: i64) -> Entity {
    let mut entity = Entity::new(&users());
    entity.set("name", name).unwrap();
    entity.set("age", age).unwrap();
    entity
}

pub fn age(entity: &Entity) -> Option<i64> {
    entity.get("age").unwrap().and_then(FieldValue::as_i64)
}
