#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Transaction wrapper and error mapping against SQLite.

mod common;

use std::time::Duration;

use sqlgate_db::{BatchLoader, BatchRecipe, DbError, LimitCfg, QueryError, QueryExecutor};
use sqlgate_query::{
    Condition, ConditionGroup, Dialect, InsertStatement, QueryCompiler, QueryPayload,
    QueryValue, SortDescriptor,
};

use common::{comments, config, exec, file_db, memory_db};

#[tokio::test]
async fn committed_insert_is_visible() {
    let db = memory_db("memdb_tx_visible").await;
    let cfg = config();
    let insert = QueryCompiler::new(&cfg, db.dialect())
        .compile_insert(
            &InsertStatement::new("items")
                .value("id", 1_i64)
                .value("name", "anvil")
                .value("status", "active"),
            None,
        )
        .unwrap();
    let affected = db
        .run_in_transaction(move |tx| Box::pin(async move { tx.execute(&insert).await }))
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let select = QueryCompiler::new(&cfg, db.dialect())
        .compile_join(
            &QueryPayload::select(["id".to_owned(), "name".to_owned()]).from_table("items"),
            None,
        )
        .unwrap();
    let row = db
        .run_in_transaction(move |tx| Box::pin(async move { tx.fetch_one(&select).await }))
        .await
        .unwrap();
    assert_eq!(row["id"], 1);
    assert_eq!(row["name"], "anvil");
}

#[tokio::test]
async fn duplicate_key_maps_to_conflict() {
    let db = memory_db("memdb_tx_conflict").await;
    exec(&db, "INSERT INTO items (id, name, status) VALUES (1, 'a', 'active')").await;
    let cfg = config();
    let insert = QueryCompiler::new(&cfg, db.dialect())
        .compile_insert(
            &InsertStatement::new("items")
                .value("id", 1_i64)
                .value("name", "b")
                .value("status", "active"),
            None,
        )
        .unwrap();
    let err = db
        .run_in_transaction(move |tx| Box::pin(async move { tx.execute(&insert).await }))
        .await
        .unwrap_err();
    assert_eq!(err, QueryError::Conflict);
    assert_eq!(err.to_string(), "the request conflicts with existing data");
}

#[tokio::test]
async fn keyed_lookup_without_rows_is_not_found() {
    let db = memory_db("memdb_tx_not_found").await;
    let cfg = config();
    let select = QueryCompiler::new(&cfg, db.dialect())
        .compile_join(
            &QueryPayload::select(["id".to_owned()])
                .from_table("items")
                .filter(ConditionGroup::and([Condition::eq("id".to_owned(), 42_i64)])),
            None,
        )
        .unwrap();
    let err = db
        .run_in_transaction(move |tx| Box::pin(async move { tx.fetch_one(&select).await }))
        .await
        .unwrap_err();
    assert_eq!(err, QueryError::NotFound);
}

#[tokio::test]
async fn undecodable_column_is_a_row_shape_error() {
    let db = memory_db("memdb_tx_row_shape").await;
    exec(&db, "INSERT INTO blobs (id, payload) VALUES (1, x'00ff')").await;
    let cfg = config();
    let select = QueryCompiler::new(&cfg, db.dialect())
        .compile_join(
            &QueryPayload::select(["id".to_owned(), "payload".to_owned()]).from_table("blobs"),
            None,
        )
        .unwrap();
    let mut tx = db.begin_tx().await.unwrap();
    let err = tx.fetch_all(&select).await.unwrap_err();
    assert!(matches!(&err, DbError::RowShape { column } if column == "payload"), "{err}");
    tx.rollback().await.unwrap();
    assert_eq!(QueryError::from(err), QueryError::InternalError);
}

#[tokio::test]
async fn queries_for_another_dialect_are_refused() {
    let db = memory_db("memdb_tx_dialect").await;
    let cfg = config();
    let pg = QueryCompiler::new(&cfg, Dialect::Postgres)
        .compile_join(&QueryPayload::select(["id".to_owned()]).from_table("items"), None)
        .unwrap();
    let tx = db.begin_tx().await.unwrap();
    assert!(matches!(
        tx.fetch_all(&pg).await,
        Err(DbError::DialectMismatch { .. })
    ));
}

#[tokio::test]
#[tracing_test::traced_test]
async fn rollback_completes_before_error_is_mapped() {
    let db = memory_db("memdb_tx_ordering").await;
    exec(&db, "INSERT INTO items (id, name, status) VALUES (1, 'a', 'active')").await;
    let cfg = config();
    let insert = QueryCompiler::new(&cfg, db.dialect())
        .compile_insert(
            &InsertStatement::new("items")
                .value("id", 1_i64)
                .value("name", "dup")
                .value("status", "active"),
            None,
        )
        .unwrap();
    let err = db
        .run_in_transaction(move |tx| Box::pin(async move { tx.execute(&insert).await }))
        .await
        .unwrap_err();
    assert_eq!(err, QueryError::Conflict);

    logs_assert(|lines: &[&str]| {
        let rolled_back = lines
            .iter()
            .position(|l| l.contains("transaction rolled back"))
            .ok_or("no rollback logged")?;
        let mapped = lines
            .iter()
            .position(|l| l.contains("database error mapped"))
            .ok_or("no mapping logged")?;
        if rolled_back < mapped {
            Ok(())
        } else {
            Err(format!("rollback at line {rolled_back}, mapping at line {mapped}"))
        }
    });
}

#[tokio::test]
async fn failing_batch_step_rolls_back_earlier_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("atomic.db");
    let writer = file_db(&path, true).await;
    let reader = file_db(&path, false).await;
    let cfg = config();

    let insert = QueryCompiler::new(&cfg, writer.dialect())
        .compile_insert(
            &InsertStatement::new("items")
                .value("id", 7_i64)
                .value("name", "widget")
                .value("status", "active"),
            None,
        )
        .unwrap();

    // `author` passes the allowlist but is missing from the table, so the
    // third step fails inside the database.
    let recipe = BatchRecipe {
        view: "items".to_owned(),
        primary_key: "id".to_owned(),
        children: comments(&["id", "author"]),
        children_field: "comments".to_owned(),
    };
    let loader = BatchLoader::new(cfg.clone(), writer.dialect(), LimitCfg::default());
    let plan = loader
        .plan(&recipe, &QueryPayload::select(["name".to_owned()]), None)
        .unwrap();

    let err = writer
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                tx.execute(&insert).await?;
                loader.load_in(tx, &plan).await
            })
        })
        .await
        .unwrap_err();
    assert_eq!(err, QueryError::InternalError);

    let count = QueryCompiler::new(&cfg, reader.dialect())
        .compile_join(&QueryPayload::select(["id".to_owned()]).from_table("items"), None)
        .unwrap();
    let rows = reader
        .run_in_transaction(move |tx| Box::pin(async move { tx.fetch_all(&count).await }))
        .await
        .unwrap();
    assert!(rows.is_empty(), "{rows:?}");
}

#[tokio::test]
async fn explicit_wrapper_supports_rollback_after_commit() {
    let db = memory_db("memdb_tx_explicit").await;
    let cfg = config();
    let insert = QueryCompiler::new(&cfg, db.dialect())
        .compile_insert(
            &InsertStatement::new("items")
                .value("id", 3_i64)
                .value("name", "kept")
                .value("status", "active"),
            None,
        )
        .unwrap();
    let mut tx = db.begin_tx().await.unwrap();
    tx.execute(&insert).await.unwrap();
    tx.commit().await.unwrap();
    tx.rollback().await.unwrap();
    tx.rollback().await.unwrap();
    drop(tx);

    let select = QueryCompiler::new(&cfg, db.dialect())
        .compile_join(&QueryPayload::select(["name".to_owned()]).from_table("items"), None)
        .unwrap();
    let tx = db.begin_tx().await.unwrap();
    let rows = tx.fetch_all(&select).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "kept");
}

#[tokio::test]
async fn cancelled_transaction_is_rolled_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cancel.db");
    let writer = file_db(&path, true).await;
    let reader = file_db(&path, false).await;
    let cfg = config();

    let insert = QueryCompiler::new(&cfg, writer.dialect())
        .compile_insert(
            &InsertStatement::new("items")
                .value("id", 11_i64)
                .value("name", "abandoned")
                .value("status", "active"),
            None,
        )
        .unwrap();
    let retry = insert.clone();

    let parked = writer.run_in_transaction(move |tx| {
        Box::pin(async move {
            tx.execute(&insert).await?;
            std::future::pending::<Result<(), DbError>>().await
        })
    });
    let outcome = tokio::time::timeout(Duration::from_millis(200), parked).await;
    assert!(outcome.is_err(), "transaction finished instead of being cancelled");

    let count = QueryCompiler::new(&cfg, reader.dialect())
        .compile_join(&QueryPayload::select(["id".to_owned()]).from_table("items"), None)
        .unwrap();
    let rows = reader
        .run_in_transaction(move |tx| Box::pin(async move { tx.fetch_all(&count).await }))
        .await
        .unwrap();
    assert!(rows.is_empty(), "{rows:?}");

    // The same key inserts cleanly once the abandoned write is gone.
    let affected = writer
        .run_in_transaction(move |tx| Box::pin(async move { tx.execute(&retry).await }))
        .await
        .unwrap();
    assert_eq!(affected, 1);
}

#[tokio::test]
async fn key_reads_return_bind_values_in_row_order() {
    let db = memory_db("memdb_tx_keys").await;
    exec(
        &db,
        "INSERT INTO items (id, name, status) VALUES (1, 'b', 'active'), (2, 'a', 'active')",
    )
    .await;
    let cfg = config();
    let keys = QueryCompiler::new(&cfg, db.dialect())
        .compile_join(
            &QueryPayload::select(["id".to_owned()])
                .from_table("items")
                .order_by(SortDescriptor::asc("name".to_owned())),
            None,
        )
        .unwrap();
    let fetched = db
        .run_in_transaction(move |tx| Box::pin(async move { tx.fetch_keys(&keys).await }))
        .await
        .unwrap();
    assert_eq!(fetched, vec![QueryValue::Int(2), QueryValue::Int(1)]);
}
