#![allow(dead_code)]

use std::sync::Arc;

use sea_orm::ConnectionTrait;
use sqlgate_db::{ConnectOpts, Db};
use sqlgate_query::{ChildRelation, QueryConfig};

pub const SCHEMA: &[&str] = &[
    "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT NOT NULL, status TEXT NOT NULL, \
     secret_column TEXT)",
    "CREATE TABLE comments (id INTEGER PRIMARY KEY, item_id INTEGER NOT NULL, body TEXT NOT NULL)",
    "CREATE TABLE blobs (id INTEGER PRIMARY KEY, payload BLOB)",
];

/// Single-connection in-memory database shared by name within the process.
pub async fn memory_db(name: &str) -> Db {
    let opts = ConnectOpts {
        max_conns: Some(1),
        ..Default::default()
    };
    let db = Db::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"), &opts)
        .await
        .expect("connect");
    create_schema(&db).await;
    db
}

/// Database file that several pools can open independently.
pub async fn file_db(path: &std::path::Path, create: bool) -> Db {
    let opts = ConnectOpts {
        max_conns: Some(1),
        ..Default::default()
    };
    let db = Db::connect(&format!("sqlite://{}?mode=rwc", path.display()), &opts)
        .await
        .expect("connect");
    if create {
        create_schema(&db).await;
    }
    db
}

pub async fn create_schema(db: &Db) {
    for ddl in SCHEMA {
        db.sea_connection().execute_unprepared(ddl).await.unwrap();
    }
}

pub async fn exec(db: &Db, sql: &str) {
    db.sea_connection().execute_unprepared(sql).await.unwrap();
}

/// `items` and `comments` allowlisted; `comments.author` is allowlisted but
/// does not exist in the schema.
pub fn config() -> Arc<QueryConfig> {
    Arc::new(
        QueryConfig::builder()
            .allow_table("items", ["id", "name", "status"])
            .allow_table("comments", ["id", "item_id", "body", "author"])
            .allow_table("blobs", ["id", "payload"])
            .build()
            .unwrap(),
    )
}

pub fn comments(columns: &[&str]) -> ChildRelation {
    ChildRelation {
        table: "comments".to_owned(),
        foreign_key: "item_id".to_owned(),
        columns: columns.iter().map(|c| (*c).to_owned()).collect(),
        order_by: Vec::new(),
    }
}
