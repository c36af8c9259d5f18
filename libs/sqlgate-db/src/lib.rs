#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Execution side of sqlgate: a transaction wrapper over sea-orm, an
//! executor for compiled queries, three-step batch loading and the mapping
//! of driver errors onto [`QueryError`].
//!
//! ```ignore
//! let db = Db::connect("sqlite::memory:", &ConnectOpts::default()).await?;
//! let query = QueryCompiler::new(&config, db.dialect()).compile_join(&payload, None)?;
//! let rows = db
//!     .run_in_transaction(move |tx| Box::pin(async move { tx.fetch_all(&query).await }))
//!     .await?;
//! ```

pub mod batch;
pub mod db;
pub mod error;
pub mod error_map;
pub mod executor;
pub mod tx;

pub use batch::{BatchLoader, BatchPlan, BatchRecipe, LimitCfg};
pub use db::{ConnectOpts, Db};
pub use error::{DbError, ErrorKind, QueryError, TxError};
pub use error_map::{classify_code, classify_db_err, map_db_error};
pub use executor::{QueryExecutor, Row};
pub use tx::{QueryTx, TxState};
