//! Driver error → [`QueryError`] classification.
//!
//! Database errors are classified by their driver code first, using one
//! lookup table covering PostgreSQL SQLSTATEs, SQLite extended result
//! codes, MySQL and SQL Server error numbers. Pool and transport failures
//! carry no code and are classified by shape.

use sea_orm::sqlx;
use sea_orm::{DbErr, RuntimeErr};

use crate::error::{DbError, ErrorKind, QueryError};

/// Driver code lookup. Codes that are not listed map to nothing and fall
/// through to the driver's own classification.
#[must_use]
pub fn classify_code(code: &str) -> Option<ErrorKind> {
    let kind = match code {
        // PostgreSQL: unique_violation, foreign_key_violation
        "23505" | "23503"
        // SQLite: CONSTRAINT_UNIQUE, CONSTRAINT_PRIMARYKEY, CONSTRAINT_FOREIGNKEY
        | "2067" | "1555" | "787"
        // MySQL: ER_DUP_ENTRY, ER_ROW_IS_REFERENCED_2, ER_NO_REFERENCED_ROW_2
        | "1062" | "1451" | "1452"
        // SQL Server: PK/unique constraint, unique index, FK constraint
        | "2627" | "2601" | "547" => ErrorKind::Conflict,

        // PostgreSQL: query_canceled (statement timeout), lock_not_available,
        // connection exceptions, admin_shutdown
        "57014" | "55P03" | "08000" | "08003" | "08006" | "57P01"
        // SQLite: BUSY, LOCKED and their extended codes
        | "5" | "6" | "261" | "262" | "517" | "773"
        // MySQL: lock wait timeout, max execution time exceeded
        | "1205" | "3024"
        // SQL Server: client timeout, lock request timeout
        | "-2" | "1222" => ErrorKind::ServiceUnavailable,

        _ => return None,
    };
    Some(kind)
}

fn driver_code(err: &dyn sqlx::error::DatabaseError) -> Option<String> {
    // MySQL reports the SQLSTATE through `code()`; the error number is more precise.
    if let Some(mysql) = err.try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>() {
        return Some(mysql.number().to_string());
    }
    err.code().map(std::borrow::Cow::into_owned)
}

fn classify_sqlx(err: &sqlx::Error) -> ErrorKind {
    match err {
        sqlx::Error::Database(db) => driver_code(db.as_ref())
            .as_deref()
            .and_then(classify_code)
            .unwrap_or_else(|| match db.kind() {
                sqlx::error::ErrorKind::UniqueViolation
                | sqlx::error::ErrorKind::ForeignKeyViolation => ErrorKind::Conflict,
                _ => ErrorKind::InternalError,
            }),
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::WorkerCrashed => ErrorKind::ServiceUnavailable,
        _ => ErrorKind::InternalError,
    }
}

/// Classify a sea-orm error without logging.
#[must_use]
pub fn classify_db_err(err: &DbErr) -> ErrorKind {
    match err {
        DbErr::Conn(RuntimeErr::SqlxError(e))
        | DbErr::Exec(RuntimeErr::SqlxError(e))
        | DbErr::Query(RuntimeErr::SqlxError(e)) => classify_sqlx(e),
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => ErrorKind::ServiceUnavailable,
        _ => ErrorKind::InternalError,
    }
}

/// Map an execution error to the client-facing taxonomy.
///
/// The full error, including driver text, is logged here; the returned
/// [`QueryError`] carries none of it.
#[must_use]
pub fn map_db_error(err: &DbError) -> QueryError {
    match err {
        DbError::Compile(e) => QueryError::from(e.clone()),
        DbError::NotFound => QueryError::NotFound,
        DbError::Sea(e) => {
            let kind = classify_db_err(e);
            if kind == ErrorKind::InternalError {
                tracing::error!(error = ?e, "database error mapped");
            } else {
                tracing::warn!(error = %e, kind = ?kind, "database error mapped");
            }
            kind.into()
        }
        DbError::InvalidTransition { .. }
        | DbError::NotActive { .. }
        | DbError::DialectMismatch { .. }
        | DbError::UnsupportedDialect(_)
        | DbError::RowShape { .. }
        | DbError::MalformedRow(_) => {
            tracing::error!(error = %err, "internal query execution error");
            QueryError::InternalError
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use sea_orm::ConnAcquireErr;
    use sqlgate_query::{CompileError, KeyPosition};

    #[test]
    fn code_table_covers_each_backend() {
        for code in ["23505", "23503", "2067", "1555", "787", "1062", "1452", "2627", "547"] {
            assert_eq!(classify_code(code), Some(ErrorKind::Conflict), "{code}");
        }
        for code in ["57014", "08006", "5", "517", "1205", "-2", "1222"] {
            assert_eq!(classify_code(code), Some(ErrorKind::ServiceUnavailable), "{code}");
        }
        assert_eq!(classify_code("42P01"), None);
        assert_eq!(classify_code("1"), None);
    }

    #[test]
    fn pool_failures_are_transient() {
        assert_eq!(
            classify_db_err(&DbErr::ConnectionAcquire(ConnAcquireErr::Timeout)),
            ErrorKind::ServiceUnavailable
        );
        assert_eq!(
            classify_db_err(&DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::PoolTimedOut))),
            ErrorKind::ServiceUnavailable
        );
        assert_eq!(
            classify_db_err(&DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::RowNotFound))),
            ErrorKind::InternalError
        );
        assert_eq!(
            classify_db_err(&DbErr::Custom("boom".to_owned())),
            ErrorKind::InternalError
        );
    }

    #[test]
    fn compile_errors_keep_their_kind() {
        let policy = DbError::Compile(CompileError::PolicyViolation {
            position: KeyPosition::Select,
            key: "secret".to_owned(),
        });
        assert_eq!(map_db_error(&policy), QueryError::PolicyViolation);

        let malformed = DbError::Compile(CompileError::MalformedPayload("x".to_owned()));
        assert_eq!(map_db_error(&malformed).kind(), ErrorKind::MalformedPayload);
    }

    #[test]
    fn internal_failures_hide_details() {
        let err = map_db_error(&DbError::RowShape {
            column: "secret_column".to_owned(),
        });
        assert_eq!(err, QueryError::InternalError);
        assert!(!err.to_string().contains("secret_column"));
        assert!(!err.is_retryable());
        assert!(map_db_error(&DbError::Sea(DbErr::ConnectionAcquire(ConnAcquireErr::Timeout)))
            .is_retryable());
    }
}
