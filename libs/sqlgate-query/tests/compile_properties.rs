#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Compiler guarantees checked against wire-form payloads:
//! - literal values only ever appear as bind parameters
//! - anything outside the allowlist is rejected before SQL exists
//! - compilation is deterministic
//! - metadata mirrors the deduplicated select list

use serde_json::json;
use sqlgate_query::{
    CompileError, Dialect, JoinClause, JoinConfiguration, JoinQueryPayload, JoinType,
    KeyPosition, QueryCompiler, QueryConfig, QueryPayload, QueryValue, TableRef,
};

sqlgate_query::entity_fields! {
    pub enum ItemField for "items" {
        Id => "id",
        Name => "name",
        Status => "status",
        SecretColumn => "secret_column",
    }
}

fn config() -> QueryConfig {
    QueryConfig::builder()
        .allow_table("items", ["id", "name", "status"])
        .allow_table(
            "item_with_category",
            ["i.id", "i.name", "i.status", "c.name AS category_name"],
        )
        .join_configuration(
            "item_with_category",
            JoinConfiguration {
                from: TableRef::aliased("items", "i"),
                joins: vec![JoinClause {
                    join_type: JoinType::Inner,
                    table: "categories".to_owned(),
                    alias: Some("c".to_owned()),
                    on: "c.id = i.category_id".to_owned(),
                }],
            },
        )
        .build()
        .unwrap()
}

fn payload(value: serde_json::Value) -> JoinQueryPayload {
    serde_json::from_value(value).unwrap()
}

const HOSTILE: &[&str] = &[
    "'; DROP TABLE items; --",
    "a' OR '1'='1",
    "x -- comment",
    "\"); DELETE FROM items; /*",
];

#[test]
fn hostile_values_only_reach_parameters() {
    let cfg = config();
    for dialect in [Dialect::Postgres, Dialect::MySql, Dialect::Sqlite, Dialect::MsSql] {
        let compiler = QueryCompiler::new(&cfg, dialect);
        for hostile in HOSTILE {
            let p = payload(json!({
                "select": ["id"],
                "from": "items",
                "where": {"operator": "OR", "conditions": [
                    {"key": "name", "operator": "EQUALS", "value": hostile},
                    {"key": "status", "operator": "IN", "value": [hostile, "ok"]},
                    {"key": "name", "operator": "LIKE", "value": hostile}
                ]}
            }));
            let q = compiler.compile_join(&p, None).unwrap();
            assert!(!q.sql().contains(hostile), "{dialect}: {}", q.sql());
            assert!(!q.sql().contains('\''), "{dialect}: {}", q.sql());
            assert!(!q.sql().contains(';'));
            assert!(!q.sql().contains("--"));
            assert_eq!(q.metadata().parameter_count, 4);
            assert_eq!(q.parameters()[0].value, QueryValue::from(*hostile));
        }
    }
}

#[test]
fn unknown_keys_are_policy_violations_in_every_position() {
    let cfg = config();
    let compiler = QueryCompiler::new(&cfg, Dialect::Postgres);
    let cases = [
        (
            json!({"select": ["id", "secret_column"], "from": "items"}),
            KeyPosition::Select,
        ),
        (
            json!({"select": ["id"], "from": "items", "where": {"operator": "AND", "conditions": [
                {"key": "secret_column", "operator": "IS_NULL"}
            ]}}),
            KeyPosition::Filter,
        ),
        (
            json!({"select": ["id"], "from": "items", "orderBy": [{"key": "secret_column"}]}),
            KeyPosition::Sort,
        ),
        (json!({"select": ["id"], "from": "users"}), KeyPosition::Table),
        (
            json!({"select": ["c.secret AS x"], "from": "item_with_category"}),
            KeyPosition::Select,
        ),
        (
            json!({"select": ["id"], "from": "items", "where": {"operator": "AND", "conditions": [
                {"key": "1=1 OR id", "operator": "EQUALS", "value": 1}
            ]}}),
            KeyPosition::Filter,
        ),
    ];
    for (value, expected) in cases {
        let err = compiler.compile_join(&payload(value.clone()), None).unwrap_err();
        assert!(
            matches!(&err, CompileError::PolicyViolation { position, .. } if *position == expected),
            "{value}: {err:?}"
        );
    }
}

#[test]
fn order_by_keys_are_checked_independently_of_select() {
    let cfg = config();
    let q = QueryCompiler::new(&cfg, Dialect::Postgres)
        .compile_join(
            &payload(json!({
                "select": ["id"],
                "from": "items",
                "orderBy": [{"key": "status", "direction": "desc"}, {"key": "name"}]
            })),
            None,
        )
        .unwrap();
    assert_eq!(q.sql(), "SELECT id FROM items ORDER BY status DESC, name ASC");
}

#[test]
fn recompiling_is_byte_identical() {
    let cfg = config();
    let compiler = QueryCompiler::new(&cfg, Dialect::Postgres);
    let p = payload(json!({
        "select": ["i.name", "category_name", "i.id"],
        "from": "item_with_category",
        "where": {"operator": "AND", "conditions": [
            {"key": "i.status", "operator": "NOT_IN", "value": ["archived", "deleted"]},
            {"operator": "OR", "conditions": [
                {"key": "i.id", "operator": "GT", "value": 10},
                {"key": "category_name", "operator": "LIKE", "value": "tool%"}
            ]}
        ]},
        "orderBy": [{"key": "i.name", "direction": "asc"}],
        "limit": 25,
        "offset": 50
    }));
    let first = compiler.compile_join(&p, None).unwrap();
    for _ in 0..10 {
        assert_eq!(compiler.compile_join(&p, None).unwrap(), first);
    }
}

#[test]
fn metadata_select_columns_match_deduplicated_select() {
    let cfg = config();
    let q = QueryCompiler::new(&cfg, Dialect::Sqlite)
        .compile_join(
            &payload(json!({
                "select": ["name", "id", "name", "status", "id"],
                "from": "items"
            })),
            None,
        )
        .unwrap();
    assert_eq!(q.metadata().select_columns, ["name", "id", "status"]);
    assert_eq!(q.sql(), "SELECT name, id, status FROM items");
}

#[test]
fn strict_scenario_matches_expected_sql() {
    let cfg = config();
    let p: QueryPayload<ItemField> = serde_json::from_value(json!({
        "select": ["id", "name"],
        "where": {"operator": "AND", "conditions": [
            {"key": "status", "operator": "EQUALS", "value": "active"}
        ]},
        "orderBy": [{"key": "name", "direction": "asc"}],
        "limit": 10
    }))
    .unwrap();
    let q = QueryCompiler::new(&cfg, Dialect::Postgres)
        .compile(&p, None)
        .unwrap();
    assert_eq!(
        q.sql(),
        "SELECT id, name FROM items WHERE (status = $1) ORDER BY name ASC OFFSET 0 ROWS FETCH NEXT 10 ROWS ONLY"
    );
    assert_eq!(q.metadata().parameter_count, 1);
}

#[test]
fn declared_field_outside_allowlist_is_rejected() {
    let cfg = config();
    let p = QueryPayload::select([ItemField::Id, ItemField::SecretColumn]);
    let err = QueryCompiler::new(&cfg, Dialect::Postgres)
        .compile(&p, None)
        .unwrap_err();
    assert_eq!(
        err,
        CompileError::PolicyViolation {
            position: KeyPosition::Select,
            key: "secret_column".to_owned()
        }
    );
}

#[test]
fn limit_and_offset_are_inlined_not_bound() {
    let cfg = config();
    let q = QueryCompiler::new(&cfg, Dialect::MySql)
        .compile_join(
            &payload(json!({"select": ["id"], "from": "items", "limit": 5, "offset": 15})),
            None,
        )
        .unwrap();
    assert_eq!(q.sql(), "SELECT id FROM items LIMIT 5 OFFSET 15");
    assert!(q.parameters().is_empty());
}
