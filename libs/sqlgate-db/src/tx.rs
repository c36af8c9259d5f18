//! Transaction wrapper.
//!
//! ```text
//! Idle --begin--> Active --commit--> Committed
//!                   |
//!                   +--rollback--> RolledBack
//! ```
//!
//! `rollback` is safe to call from any state; outside `Active` it does
//! nothing, so error paths can call it unconditionally. `commit` after a
//! terminal state is also a no-op. A second `begin` fails: transactions
//! do not nest.

use std::fmt;

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use sqlgate_query::Dialect;

use crate::error::DbError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxState {
    Idle,
    Active,
    Committed,
    RolledBack,
}

impl TxState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
        })
    }
}

/// One transaction on one pooled connection.
///
/// Dropping an active wrapper (for example when the request future is
/// cancelled) rolls the transaction back.
pub struct QueryTx {
    conn: DatabaseConnection,
    dialect: Dialect,
    state: TxState,
    txn: Option<DatabaseTransaction>,
}

impl fmt::Debug for QueryTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryTx")
            .field("dialect", &self.dialect)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl QueryTx {
    #[must_use]
    pub fn new(conn: DatabaseConnection, dialect: Dialect) -> Self {
        Self {
            conn,
            dialect,
            state: TxState::Idle,
            txn: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> TxState {
        self.state
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Start the transaction.
    ///
    /// # Errors
    ///
    /// [`DbError::InvalidTransition`] unless the wrapper is `Idle`; a
    /// database error if the driver cannot begin.
    pub async fn begin(&mut self) -> Result<(), DbError> {
        if self.state != TxState::Idle {
            return Err(DbError::InvalidTransition {
                from: self.state,
                action: "begin",
            });
        }
        self.txn = Some(self.conn.begin().await?);
        self.state = TxState::Active;
        tracing::debug!(dialect = %self.dialect, "transaction started");
        Ok(())
    }

    /// Commit the transaction. A no-op once committed or rolled back.
    ///
    /// # Errors
    ///
    /// [`DbError::InvalidTransition`] when the transaction never began; a
    /// database error if the commit fails. A failed commit leaves the
    /// wrapper rolled back.
    pub async fn commit(&mut self) -> Result<(), DbError> {
        match self.state {
            TxState::Idle => Err(DbError::InvalidTransition {
                from: self.state,
                action: "commit",
            }),
            TxState::Committed | TxState::RolledBack => Ok(()),
            TxState::Active => {
                let Some(txn) = self.txn.take() else {
                    self.state = TxState::RolledBack;
                    return Err(DbError::NotActive { state: self.state });
                };
                match txn.commit().await {
                    Ok(()) => {
                        self.state = TxState::Committed;
                        tracing::debug!("transaction committed");
                        Ok(())
                    }
                    Err(e) => {
                        self.state = TxState::RolledBack;
                        Err(e.into())
                    }
                }
            }
        }
    }

    /// Roll the transaction back. A no-op outside `Active`.
    ///
    /// # Errors
    ///
    /// A database error if the driver rollback fails; the wrapper is
    /// considered rolled back either way.
    pub async fn rollback(&mut self) -> Result<(), DbError> {
        if self.state != TxState::Active {
            return Ok(());
        }
        self.state = TxState::RolledBack;
        if let Some(txn) = self.txn.take() {
            txn.rollback().await?;
        }
        tracing::debug!("transaction rolled back");
        Ok(())
    }

    /// The open transaction, when `Active`.
    pub(crate) fn active(&self) -> Result<&DatabaseTransaction, DbError> {
        match (&self.txn, self.state) {
            (Some(txn), TxState::Active) => Ok(txn),
            (_, state) => Err(DbError::NotActive { state }),
        }
    }
}

impl Drop for QueryTx {
    fn drop(&mut self) {
        if self.state == TxState::Active {
            // sea-orm rolls the inner transaction back when it is dropped.
            tracing::warn!("transaction dropped while active; rolling back");
        }
    }
}
