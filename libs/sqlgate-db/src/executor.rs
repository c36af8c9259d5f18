//! Running compiled statements and decoding their rows.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DbBackend, QueryResult, Statement, TryGetable};
use serde_json::{Map, Number, Value};
use sqlgate_query::{CompiledQuery, Dialect, QueryValue};
use uuid::Uuid;

use crate::error::DbError;
use crate::tx::QueryTx;

/// A decoded result row, keyed by result column name.
pub type Row = Map<String, Value>;

/// Executes compiled statements.
///
/// Rows are validated against the statement's result columns: a row that
/// lacks one of them, or carries it in a type that cannot be decoded, fails
/// with [`DbError::RowShape`].
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run a read and return every row.
    async fn fetch_all(&self, query: &CompiledQuery) -> Result<Vec<Row>, DbError>;

    /// Run a write and return the number of affected rows.
    async fn execute(&self, query: &CompiledQuery) -> Result<u64, DbError>;

    /// Run a read that must return at least one row; extra rows are ignored.
    async fn fetch_one(&self, query: &CompiledQuery) -> Result<Row, DbError> {
        self.fetch_all(query)
            .await?
            .into_iter()
            .next()
            .ok_or(DbError::NotFound)
    }

    /// Run a read and return its first result column as bind values, in row
    /// order. Null keys are a [`DbError::RowShape`].
    ///
    /// The default goes through the decoded rows; executors that see column
    /// types keep native UUIDs typed.
    async fn fetch_keys(&self, query: &CompiledQuery) -> Result<Vec<QueryValue>, DbError> {
        let column = key_column(query)?;
        self.fetch_all(query)
            .await?
            .iter()
            .map(|row| key_value(row.get(column).unwrap_or(&Value::Null), column))
            .collect()
    }
}

fn key_column(query: &CompiledQuery) -> Result<&str, DbError> {
    query
        .metadata()
        .result_columns
        .first()
        .map(String::as_str)
        .ok_or_else(|| DbError::MalformedRow("key query has no result column".to_owned()))
}

fn row_shape(column: &str) -> DbError {
    DbError::RowShape {
        column: column.to_owned(),
    }
}

pub(crate) fn backend_for(dialect: Dialect) -> Result<DbBackend, DbError> {
    match dialect {
        Dialect::Postgres => Ok(DbBackend::Postgres),
        Dialect::MySql => Ok(DbBackend::MySql),
        Dialect::Sqlite => Ok(DbBackend::Sqlite),
        Dialect::MsSql => Err(DbError::UnsupportedDialect(dialect)),
    }
}

fn sea_value(value: &QueryValue) -> sea_orm::Value {
    match value {
        QueryValue::Bool(b) => (*b).into(),
        QueryValue::Int(i) => (*i).into(),
        QueryValue::Float(f) => (*f).into(),
        QueryValue::Text(s) => s.clone().into(),
        QueryValue::Uuid(u) => (*u).into(),
    }
}

fn statement(dialect: Dialect, query: &CompiledQuery) -> Result<Statement, DbError> {
    if query.dialect() != dialect {
        return Err(DbError::DialectMismatch {
            compiled: query.dialect(),
            backend: dialect,
        });
    }
    Ok(Statement::from_sql_and_values(
        backend_for(dialect)?,
        query.sql(),
        query.values().map(sea_value),
    ))
}

fn try_column<T: TryGetable>(row: &QueryResult, column: &str) -> Option<Option<T>> {
    row.try_get::<Option<T>>("", column).ok()
}

/// Decode one column by probing the supported scalar types in turn.
///
/// UUID, NUMERIC and JSON columns are only probed on server backends; SQLite
/// stores them as text or blobs, which the earlier probes already cover.
fn decode_column(row: &QueryResult, column: &str, backend: DbBackend) -> Result<Value, DbError> {
    if let Some(v) = try_column::<i64>(row, column) {
        return Ok(v.map_or(Value::Null, Value::from));
    }
    if let Some(v) = try_column::<i32>(row, column) {
        return Ok(v.map_or(Value::Null, Value::from));
    }
    if let Some(v) = try_column::<i16>(row, column) {
        return Ok(v.map_or(Value::Null, Value::from));
    }
    if let Some(v) = try_column::<f64>(row, column) {
        return Ok(v.and_then(Number::from_f64).map_or(Value::Null, Value::Number));
    }
    if let Some(v) = try_column::<f32>(row, column) {
        return Ok(v
            .and_then(|f| Number::from_f64(f64::from(f)))
            .map_or(Value::Null, Value::Number));
    }
    if let Some(v) = try_column::<bool>(row, column) {
        return Ok(v.map_or(Value::Null, Value::Bool));
    }
    if let Some(v) = try_column::<String>(row, column) {
        return Ok(v.map_or(Value::Null, Value::String));
    }
    if backend != DbBackend::Sqlite {
        if let Some(v) = try_column::<Uuid>(row, column) {
            return Ok(v.map_or(Value::Null, |u| Value::String(u.to_string())));
        }
        // Exact decimal text; a JSON number would round through f64.
        if let Some(v) = try_column::<Decimal>(row, column) {
            return Ok(v.map_or(Value::Null, |d| Value::String(d.to_string())));
        }
        if let Some(v) = try_column::<Value>(row, column) {
            return Ok(v.unwrap_or(Value::Null));
        }
    }
    if let Some(v) = try_column::<DateTime<Utc>>(row, column) {
        return Ok(v.map_or(Value::Null, |t| Value::String(t.to_rfc3339())));
    }
    if let Some(v) = try_column::<NaiveDateTime>(row, column) {
        return Ok(v.map_or(Value::Null, |t| {
            Value::String(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        }));
    }
    if let Some(v) = try_column::<NaiveDate>(row, column) {
        return Ok(v.map_or(Value::Null, |d| Value::String(d.to_string())));
    }
    Err(row_shape(column))
}

pub(crate) fn decode_row(
    row: &QueryResult,
    columns: &[String],
    backend: DbBackend,
) -> Result<Row, DbError> {
    let mut out = Map::with_capacity(columns.len());
    for column in columns {
        out.insert(column.clone(), decode_column(row, column, backend)?);
    }
    Ok(out)
}

/// Decode a key column, keeping UUIDs typed for rebinding.
fn decode_key(row: &QueryResult, column: &str, backend: DbBackend) -> Result<QueryValue, DbError> {
    if backend != DbBackend::Sqlite
        && let Some(Some(u)) = try_column::<Uuid>(row, column)
    {
        return Ok(QueryValue::Uuid(u));
    }
    key_value(&decode_column(row, column, backend)?, column)
}

fn key_value(value: &Value, column: &str) -> Result<QueryValue, DbError> {
    match value {
        Value::Null => Err(row_shape(column)),
        v => QueryValue::from_json(v).map_err(DbError::MalformedRow),
    }
}

#[async_trait]
impl QueryExecutor for QueryTx {
    async fn fetch_all(&self, query: &CompiledQuery) -> Result<Vec<Row>, DbError> {
        let txn = self.active()?;
        let stmt = statement(self.dialect(), query)?;
        tracing::debug!(
            table = %query.metadata().table,
            parameters = query.metadata().parameter_count,
            "executing read"
        );
        let rows = txn.query_all(stmt).await?;
        let backend = backend_for(self.dialect())?;
        let columns = &query.metadata().result_columns;
        rows.iter().map(|r| decode_row(r, columns, backend)).collect()
    }

    async fn fetch_keys(&self, query: &CompiledQuery) -> Result<Vec<QueryValue>, DbError> {
        let txn = self.active()?;
        let stmt = statement(self.dialect(), query)?;
        let column = key_column(query)?;
        tracing::debug!(table = %query.metadata().table, "executing key read");
        let backend = backend_for(self.dialect())?;
        let rows = txn.query_all(stmt).await?;
        rows.iter().map(|r| decode_key(r, column, backend)).collect()
    }

    async fn execute(&self, query: &CompiledQuery) -> Result<u64, DbError> {
        let txn = self.active()?;
        let stmt = statement(self.dialect(), query)?;
        tracing::debug!(table = %query.metadata().table, "executing write");
        Ok(txn.execute(stmt).await?.rows_affected())
    }
}
