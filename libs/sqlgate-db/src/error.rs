use sqlgate_query::{CompileError, Dialect};
use thiserror::Error;

use crate::tx::TxState;

/// Errors raised while executing compiled queries.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("cannot {action} a transaction in state {from}")]
    InvalidTransition {
        from: TxState,
        action: &'static str,
    },

    #[error("no active transaction (state {state})")]
    NotActive { state: TxState },

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("query compiled for {compiled} cannot run on a {backend} connection")]
    DialectMismatch { compiled: Dialect, backend: Dialect },

    #[error("dialect {0} has no database backend")]
    UnsupportedDialect(Dialect),

    /// A row lacks an expected column, or carries it in an undecodable type.
    #[error("result row does not carry column `{column}`")]
    RowShape { column: String },

    #[error("malformed row: {0}")]
    MalformedRow(String),

    #[error("no rows found")]
    NotFound,

    #[error(transparent)]
    Sea(#[from] sea_orm::DbErr),
}

/// Error of a transactional unit of work.
///
/// `Domain` is whatever the closure returned; `Infra` covers begin/commit
/// failures of the transaction itself.
#[derive(Error, Debug)]
pub enum TxError<E> {
    #[error("{0}")]
    Domain(E),

    #[error("transaction failed: {0}")]
    Infra(DbError),
}

impl<E> TxError<E> {
    /// Collapse into the domain error type.
    pub fn into_domain(self, map_infra: impl FnOnce(DbError) -> E) -> E {
        match self {
            Self::Domain(e) => e,
            Self::Infra(e) => map_infra(e),
        }
    }
}

/// Application-level failure taxonomy.
///
/// Display texts are safe to return to clients; driver text, SQL and
/// allowlist contents never appear in them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("{0}")]
    MalformedPayload(String),

    #[error("the query references a table, column or join that is not permitted")]
    PolicyViolation,

    #[error("resource not found")]
    NotFound,

    #[error("the request conflicts with existing data")]
    Conflict,

    #[error("the database is temporarily unavailable, retry later")]
    ServiceUnavailable,

    #[error("an internal error occurred")]
    InternalError,
}

/// Discriminant of [`QueryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedPayload,
    PolicyViolation,
    NotFound,
    Conflict,
    ServiceUnavailable,
    InternalError,
}

impl QueryError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedPayload(_) => ErrorKind::MalformedPayload,
            Self::PolicyViolation => ErrorKind::PolicyViolation,
            Self::NotFound => ErrorKind::NotFound,
            Self::Conflict => ErrorKind::Conflict,
            Self::ServiceUnavailable => ErrorKind::ServiceUnavailable,
            Self::InternalError => ErrorKind::InternalError,
        }
    }

    /// Transient failures a client may retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable)
    }
}

impl From<ErrorKind> for QueryError {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::MalformedPayload => Self::MalformedPayload("malformed payload".to_owned()),
            ErrorKind::PolicyViolation => Self::PolicyViolation,
            ErrorKind::NotFound => Self::NotFound,
            ErrorKind::Conflict => Self::Conflict,
            ErrorKind::ServiceUnavailable => Self::ServiceUnavailable,
            ErrorKind::InternalError => Self::InternalError,
        }
    }
}

impl From<CompileError> for QueryError {
    fn from(e: CompileError) -> Self {
        match e {
            CompileError::MalformedPayload(msg) => Self::MalformedPayload(msg),
            CompileError::PolicyViolation { .. } => Self::PolicyViolation,
            CompileError::Unsupported { .. } => {
                tracing::error!(error = %e, "query construct unsupported by the configured dialect");
                Self::InternalError
            }
        }
    }
}

impl From<DbError> for QueryError {
    fn from(e: DbError) -> Self {
        crate::error_map::map_db_error(&e)
    }
}
