//! Three-step batch loading of a paginated parent listing with one child
//! collection per parent.
//!
//! 1. collect the page's primary keys under the request's filter, sort,
//!    limit and offset;
//! 2. fetch the projected parent rows for exactly those keys;
//! 3. fetch the children of all keys at once, aggregated by the database
//!    into one JSON array per parent;
//!
//! then merge 2 and 3 in step-1 order. All three reads share one
//! transaction, so the round-trip count is fixed and a failure in any step
//! rolls back everything done in it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlgate_query::{
    CHILDREN_COLUMN, ChildRelation, CompiledQuery, Dialect, JoinQueryPayload, KeyLookup,
    PARENT_KEY_COLUMN, QueryCompiler, QueryConfig, QueryValue, SecurityOverride,
};
use tracing::instrument;

use crate::db::Db;
use crate::error::{DbError, QueryError};
use crate::executor::{QueryExecutor, Row};

/// Page size bounds applied to batch loads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitCfg {
    pub default: u64,
    pub max: u64,
}

impl Default for LimitCfg {
    fn default() -> Self {
        Self { default: 25, max: 200 }
    }
}

impl LimitCfg {
    /// Requested limit, or the default, capped at `max`.
    #[must_use]
    pub fn clamp(&self, requested: Option<u64>) -> u64 {
        requested.unwrap_or(self.default).min(self.max)
    }
}

fn default_children_field() -> String {
    "children".to_owned()
}

/// A named parent/children shape served by the batch loader.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchRecipe {
    /// Allowlisted table or view listing the parents.
    pub view: String,
    /// Key of the parent's primary key within `view`.
    pub primary_key: String,
    pub children: ChildRelation,
    /// Field of each merged row holding the child array.
    #[serde(default = "default_children_field")]
    pub children_field: String,
}

/// A validated batch load, ready to run.
#[derive(Clone, Debug)]
pub struct BatchPlan {
    recipe: BatchRecipe,
    select: Vec<String>,
    security: SecurityOverride,
    keys_query: CompiledQuery,
}

impl BatchPlan {
    /// The step-1 statement.
    #[must_use]
    pub fn keys_query(&self) -> &CompiledQuery {
        &self.keys_query
    }

    /// Requested parent columns.
    #[must_use]
    pub fn select(&self) -> &[String] {
        &self.select
    }

    #[must_use]
    pub fn recipe(&self) -> &BatchRecipe {
        &self.recipe
    }
}

/// Runs [`BatchRecipe`]s against one allowlist.
#[derive(Clone, Debug)]
pub struct BatchLoader {
    config: Arc<QueryConfig>,
    dialect: Dialect,
    limits: LimitCfg,
}

impl BatchLoader {
    #[must_use]
    pub fn new(config: Arc<QueryConfig>, dialect: Dialect, limits: LimitCfg) -> Self {
        Self {
            config,
            dialect,
            limits,
        }
    }

    fn compiler(&self) -> QueryCompiler<'_> {
        QueryCompiler::new(&self.config, self.dialect)
    }

    /// Validate a request and compile step 1.
    ///
    /// Steps 2 and 3 are compiled once with a placeholder key so that every
    /// policy or shape error surfaces here, before any transaction begins.
    /// The recipe's view is pinned as the target regardless of the
    /// payload's `from`; the caller's override scope and joins still apply.
    ///
    /// # Errors
    ///
    /// [`QueryError::MalformedPayload`] or [`QueryError::PolicyViolation`]
    /// from compilation; [`QueryError::InternalError`] if the dialect
    /// cannot aggregate children.
    pub fn plan(
        &self,
        recipe: &BatchRecipe,
        payload: &JoinQueryPayload,
        security: Option<&SecurityOverride>,
    ) -> Result<BatchPlan, QueryError> {
        if payload.limit == Some(0) {
            return Err(QueryError::MalformedPayload(
                "limit must be a positive integer".to_owned(),
            ));
        }
        let mut security = security.cloned().unwrap_or_default();
        security.table = Some(recipe.view.clone());

        let mut keys_payload = payload.clone();
        keys_payload.select = vec![recipe.primary_key.clone()];
        keys_payload.limit = Some(self.limits.clamp(payload.limit));

        let compiler = self.compiler();
        let keys_query = compiler.compile_join(&keys_payload, Some(&security))?;

        let probe = [QueryValue::Int(0)];
        compiler.compile_key_lookup(
            &KeyLookup {
                table: &recipe.view,
                key_column: &recipe.primary_key,
                select: &payload.select,
                keys: &probe,
            },
            Some(&security),
        )?;
        compiler.compile_child_aggregate(&recipe.children, &probe)?;

        Ok(BatchPlan {
            recipe: recipe.clone(),
            select: payload.select.clone(),
            security,
            keys_query,
        })
    }

    /// Run a plan on an open transaction.
    ///
    /// # Errors
    ///
    /// Any execution or row-shape error of the three steps.
    pub async fn load_in<E>(&self, exec: &E, plan: &BatchPlan) -> Result<Vec<Row>, DbError>
    where
        E: QueryExecutor + ?Sized,
    {
        let key_column = plan
            .keys_query
            .metadata()
            .result_columns
            .first()
            .cloned()
            .ok_or_else(|| DbError::MalformedRow("key query has no result column".to_owned()))?;

        let fetched = exec.fetch_keys(&plan.keys_query).await?;
        let mut seen = HashSet::with_capacity(fetched.len());
        let mut order = Vec::with_capacity(fetched.len());
        let mut keys = Vec::with_capacity(fetched.len());
        for key in fetched {
            // Tokens are compared against keys decoded into rows, so both
            // sides go through the JSON form.
            let token = key.to_json().to_string();
            if seen.insert(token.clone()) {
                keys.push(key);
                order.push(token);
            }
        }
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let recipe = &plan.recipe;
        let compiler = self.compiler();
        let detail_query = compiler.compile_key_lookup(
            &KeyLookup {
                table: &recipe.view,
                key_column: &recipe.primary_key,
                select: &plan.select,
                keys: &keys,
            },
            Some(&plan.security),
        )?;
        let children_query = compiler.compile_child_aggregate(&recipe.children, &keys)?;

        let mut details: HashMap<String, Row> = HashMap::with_capacity(keys.len());
        for row in exec.fetch_all(&detail_query).await? {
            details.insert(key_of(&row, &key_column)?.to_string(), row);
        }

        let mut children: HashMap<String, Value> = HashMap::with_capacity(keys.len());
        for row in exec.fetch_all(&children_query).await? {
            let parent = key_of(&row, PARENT_KEY_COLUMN)?.to_string();
            let array = parse_children(row.get(CHILDREN_COLUMN))?;
            children.insert(parent, array);
        }

        let mut merged = Vec::with_capacity(order.len());
        for token in &order {
            let Some(mut row) = details.remove(token) else {
                tracing::debug!(key = %token, "key from step 1 missing in detail fetch");
                continue;
            };
            let array = children
                .remove(token)
                .unwrap_or_else(|| Value::Array(Vec::new()));
            row.insert(recipe.children_field.clone(), array);
            merged.push(row);
        }
        Ok(merged)
    }

    /// Run a plan in its own transaction.
    ///
    /// # Errors
    ///
    /// The mapped [`QueryError`]; the transaction is rolled back first.
    #[instrument(
        name = "sqlgate.batch.load",
        skip(self, db, plan),
        fields(view = %plan.recipe.view, children = %plan.recipe.children.table)
    )]
    pub async fn load(&self, db: &Db, plan: &BatchPlan) -> Result<Vec<Row>, QueryError> {
        let loader = self.clone();
        let plan = plan.clone();
        let rows = db
            .run_in_transaction(move |tx| {
                Box::pin(async move { loader.load_in(tx, &plan).await })
            })
            .await?;
        tracing::debug!(rows = rows.len(), "batch loaded");
        Ok(rows)
    }
}

fn key_of<'r>(row: &'r Row, column: &str) -> Result<&'r Value, DbError> {
    match row.get(column) {
        Some(Value::Null) | None => Err(DbError::RowShape {
            column: column.to_owned(),
        }),
        Some(v) => Ok(v),
    }
}

fn parse_children(value: Option<&Value>) -> Result<Value, DbError> {
    match value {
        Some(Value::String(text)) => {
            let parsed: Value =
                serde_json::from_str(text).map_err(|e| DbError::MalformedRow(e.to_string()))?;
            if parsed.is_array() {
                Ok(parsed)
            } else {
                Err(DbError::MalformedRow("children aggregate is not an array".to_owned()))
            }
        }
        Some(Value::Array(items)) => Ok(Value::Array(items.clone())),
        Some(Value::Null) | None => Ok(Value::Array(Vec::new())),
        Some(_) => Err(DbError::MalformedRow(
            "children aggregate is not an array".to_owned(),
        )),
    }
}
