use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend};
use serde::{Deserialize, Serialize};
use sqlgate_query::Dialect;

use crate::error::{DbError, QueryError, TxError};
use crate::tx::QueryTx;

/// Pool options for [`Db::connect`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectOpts {
    pub max_conns: Option<u32>,
    pub min_conns: Option<u32>,
    /// Pool acquire timeout in seconds.
    pub acquire_timeout_secs: Option<u64>,
    /// Let sqlx log every statement.
    pub sqlx_logging: bool,
}

/// Connection pool plus the dialect compiled queries must target.
#[derive(Clone)]
pub struct Db {
    conn: DatabaseConnection,
    dialect: Dialect,
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("dialect", &self.dialect)
            .finish_non_exhaustive()
    }
}

impl Db {
    /// Connect to `url` (`postgres://`, `mysql://` or `sqlite:`).
    ///
    /// # Errors
    ///
    /// Returns a database error if the pool cannot be created.
    pub async fn connect(url: &str, opts: &ConnectOpts) -> Result<Self, DbError> {
        let mut options = ConnectOptions::new(url.to_owned());
        if let Some(n) = opts.max_conns {
            options.max_connections(n);
        }
        if let Some(n) = opts.min_conns {
            options.min_connections(n);
        }
        if let Some(secs) = opts.acquire_timeout_secs {
            options.acquire_timeout(Duration::from_secs(secs));
        }
        options.sqlx_logging(opts.sqlx_logging);

        let conn = Database::connect(options).await?;
        let db = Self::from_connection(conn);
        tracing::info!(dialect = %db.dialect, "database connected");
        Ok(db)
    }

    /// Wrap an existing sea-orm connection.
    #[must_use]
    pub fn from_connection(conn: DatabaseConnection) -> Self {
        let dialect = match conn.get_database_backend() {
            DbBackend::Postgres => Dialect::Postgres,
            DbBackend::MySql => Dialect::MySql,
            DbBackend::Sqlite => Dialect::Sqlite,
        };
        Self { conn, dialect }
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Underlying connection, for schema setup and health checks. Query
    /// traffic goes through [`QueryTx`].
    #[must_use]
    pub fn sea_connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Round-trip to the database.
    ///
    /// # Errors
    ///
    /// Returns a database error if the ping fails.
    pub async fn ping(&self) -> Result<(), DbError> {
        self.conn.ping().await?;
        Ok(())
    }

    /// A new wrapper that has already begun.
    ///
    /// # Errors
    ///
    /// Returns a database error if the transaction cannot begin.
    pub async fn begin_tx(&self) -> Result<QueryTx, DbError> {
        let mut tx = QueryTx::new(self.conn.clone(), self.dialect);
        tx.begin().await?;
        Ok(tx)
    }

    /// Run `f` in one transaction: commit on `Ok`, roll back on `Err`.
    ///
    /// The rollback completes before the error is returned.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let rows = db
    ///     .in_transaction(move |tx| Box::pin(async move { tx.fetch_all(&query).await }))
    ///     .await
    ///     .map_err(|e| e.into_domain(|infra| infra))?;
    /// ```
    ///
    /// # Errors
    ///
    /// [`TxError::Domain`] with the closure's error, or [`TxError::Infra`]
    /// when begin or commit fails.
    pub async fn in_transaction<T, E, F>(&self, f: F) -> Result<T, TxError<E>>
    where
        T: Send + 'static,
        E: fmt::Debug + fmt::Display + Send + 'static,
        F: for<'a> FnOnce(&'a QueryTx) -> Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>
            + Send,
    {
        let mut tx = self.begin_tx().await.map_err(TxError::Infra)?;

        let res = f(&tx).await;

        match res {
            Ok(v) => {
                tx.commit().await.map_err(TxError::Infra)?;
                Ok(v)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    tracing::warn!(error = %rb, "rollback failed");
                }
                Err(TxError::Domain(e))
            }
        }
    }

    /// [`Self::in_transaction`] with infrastructure errors mapped into `E`.
    ///
    /// # Errors
    ///
    /// The closure's error, or `map_infra` applied to a begin/commit failure.
    pub async fn in_transaction_mapped<T, E, F, M>(&self, map_infra: M, f: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: fmt::Debug + fmt::Display + Send + 'static,
        M: FnOnce(DbError) -> E + Send,
        F: for<'a> FnOnce(&'a QueryTx) -> Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>
            + Send,
    {
        self.in_transaction(f)
            .await
            .map_err(|e| e.into_domain(map_infra))
    }

    /// Run `f` in one transaction and map any failure to a [`QueryError`].
    ///
    /// Mapping happens only after the rollback has finished.
    ///
    /// # Errors
    ///
    /// The mapped [`QueryError`].
    pub async fn run_in_transaction<T, F>(&self, f: F) -> Result<T, QueryError>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(
                &'a QueryTx,
            ) -> Pin<Box<dyn Future<Output = Result<T, DbError>> + Send + 'a>>
            + Send,
    {
        self.in_transaction_mapped(|infra| infra, f)
            .await
            .map_err(QueryError::from)
    }
}
