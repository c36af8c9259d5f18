use std::collections::BTreeMap;
use std::sync::Arc;

use sqlgate_db::{BatchLoader, BatchRecipe, Db, LimitCfg, QueryError, QueryExecutor, Row};
use sqlgate_query::{CompiledQuery, JoinQueryPayload, QueryCompiler, QueryConfig, SecurityOverride};
use tracing::instrument;

use crate::envelope::ResultMeta;

/// Rows plus the statement that identified them.
#[derive(Clone, Debug)]
pub struct QueryOutcome {
    pub rows: Vec<Row>,
    pub query: CompiledQuery,
    pub select: Vec<String>,
}

impl QueryOutcome {
    #[must_use]
    pub fn meta(&self, expose_sql: bool) -> ResultMeta {
        let mut meta = ResultMeta::describe(&self.query, self.rows.len(), expose_sql);
        meta.columns_selected.clone_from(&self.select);
        meta
    }
}

/// Query endpoints' service: one allowlist, one database.
pub struct QueryService {
    db: Db,
    config: Arc<QueryConfig>,
    recipes: BTreeMap<String, BatchRecipe>,
    loader: BatchLoader,
    expose_sql: bool,
}

impl QueryService {
    #[must_use]
    pub fn new(
        db: Db,
        config: Arc<QueryConfig>,
        recipes: BTreeMap<String, BatchRecipe>,
        limits: LimitCfg,
        expose_sql: bool,
    ) -> Self {
        let loader = BatchLoader::new(config.clone(), db.dialect(), limits);
        Self {
            db,
            config,
            recipes,
            loader,
            expose_sql,
        }
    }

    #[must_use]
    pub fn expose_sql(&self) -> bool {
        self.expose_sql
    }

    /// Run a flexible payload against `view`, which overrides any `from`
    /// the client sent.
    ///
    /// # Errors
    ///
    /// Compile errors before anything runs, mapped execution errors after.
    #[instrument(name = "sqlgate.query", skip(self, payload))]
    pub async fn query(
        &self,
        view: &str,
        payload: &JoinQueryPayload,
    ) -> Result<QueryOutcome, QueryError> {
        let security = SecurityOverride::pin_table(view);
        let query = QueryCompiler::new(&self.config, self.db.dialect())
            .compile_join(payload, Some(&security))?;

        let statement = query.clone();
        let rows = self
            .db
            .run_in_transaction(move |tx| {
                Box::pin(async move { tx.fetch_all(&statement).await })
            })
            .await?;
        tracing::debug!(rows = rows.len(), "query served");

        Ok(QueryOutcome {
            rows,
            select: query.metadata().select_columns.clone(),
            query,
        })
    }

    /// Run the batch recipe named `recipe`.
    ///
    /// # Errors
    ///
    /// [`QueryError::NotFound`] for an unknown recipe, otherwise as
    /// [`BatchLoader::plan`] and [`BatchLoader::load`].
    #[instrument(name = "sqlgate.batch", skip(self, payload))]
    pub async fn batch(
        &self,
        recipe: &str,
        payload: &JoinQueryPayload,
    ) -> Result<QueryOutcome, QueryError> {
        let recipe = self.recipes.get(recipe).ok_or(QueryError::NotFound)?;
        let plan = self.loader.plan(recipe, payload, None)?;
        let rows = self.loader.load(&self.db, &plan).await?;
        Ok(QueryOutcome {
            rows,
            query: plan.keys_query().clone(),
            select: plan.select().to_vec(),
        })
    }

    /// # Errors
    ///
    /// [`QueryError::ServiceUnavailable`] when the database does not answer.
    pub async fn health(&self) -> Result<(), QueryError> {
        self.db.ping().await.map_err(|e| {
            tracing::warn!(error = %e, "health check failed");
            QueryError::ServiceUnavailable
        })
    }
}
