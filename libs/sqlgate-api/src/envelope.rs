//! JSON envelopes of the query endpoints.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlgate_db::Row;
use sqlgate_query::{CompiledQuery, JoinQueryPayload};

/// `{ "payload": { ... } }`
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryRequest {
    pub payload: JoinQueryPayload,
}

#[must_use]
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeMeta {
    pub timestamp: String,
}

impl EnvelopeMeta {
    #[must_use]
    pub fn now() -> Self {
        Self {
            timestamp: timestamp(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SuccessEnvelope<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
    pub meta: EnvelopeMeta,
}

impl<T> SuccessEnvelope<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            meta: EnvelopeMeta::now(),
        }
    }
}

/// Describes how a result set was produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResultMeta {
    pub retrieved_at: String,
    pub result_count: usize,
    pub columns_selected: Vec<String>,
    pub has_joins: bool,
    pub has_where: bool,
    pub parameter_count: usize,
    pub table_fixed: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_generated: Option<String>,
}

impl ResultMeta {
    #[must_use]
    pub fn describe(query: &CompiledQuery, result_count: usize, expose_sql: bool) -> Self {
        let metadata = query.metadata();
        Self {
            retrieved_at: timestamp(),
            result_count,
            columns_selected: metadata.select_columns.clone(),
            has_joins: metadata.has_joins,
            has_where: metadata.has_where,
            parameter_count: metadata.parameter_count,
            table_fixed: metadata.table.clone(),
            sql_generated: expose_sql.then(|| query.sql().to_owned()),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct QueryData {
    pub results: Vec<Row>,
    pub meta: ResultMeta,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadRequest,
    ValidationError,
    NotFound,
    InternalServerError,
    Conflict,
}

#[derive(Clone, Debug, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub message: String,
    pub status_code: u16,
    pub error_code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
    pub meta: EnvelopeMeta,
}

impl ErrorEnvelope {
    pub fn new(status_code: u16, error_code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            status_code,
            error_code,
            errors: None,
            meta: EnvelopeMeta::now(),
        }
    }

    #[must_use]
    pub fn with_errors(mut self, errors: Value) -> Self {
        self.errors = Some(errors);
        self
    }
}
