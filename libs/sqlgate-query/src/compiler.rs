//! Payload → parameterized SQL.
//!
//! Compilation is fail-closed: every table, select column, filter key, sort
//! key and join is checked against the [`QueryConfig`] before any SQL text is
//! produced, and the first violation aborts with no output. Literal values
//! never reach the SQL text; each one becomes a named bind parameter
//! (`p1`, `p2`, ...) in depth-first, left-to-right order of the filter tree.
//!
//! Only identifiers taken from the allowlist (in their normalised form) and
//! operator tokens from closed enums are ever written into the statement.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::aggregate::{self, PARENT_KEY_COLUMN, SOURCE_ALIAS};
use crate::config::{AllowedColumn, QueryConfig, TableAccess, TableRef};
use crate::dialect::Dialect;
use crate::error::{CompileError, KeyPosition};
use crate::grammar::{
    AnyPayload, Condition, ConditionGroup, ConditionNode, EntityFields, GroupOperator,
    JoinClause, JoinQueryPayload, Predicate, QueryPayload, SortDescriptor,
};
use crate::value::QueryValue;

/// Largest `limit` or `offset` every backend accepts as a row count.
const MAX_PAGE_BOUND: u64 = i64::MAX.unsigned_abs();

/// A value bound to a named placeholder.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundParam {
    pub name: String,
    pub value: QueryValue,
}

/// Descriptive data about a compiled statement. Informational only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryMetadata {
    /// Requested select keys, deduplicated in first-seen order.
    pub select_columns: Vec<String>,
    /// Column names a result row carries.
    pub result_columns: Vec<String>,
    pub has_joins: bool,
    pub has_where: bool,
    pub parameter_count: usize,
    /// Resolved table or view name.
    pub table: String,
}

/// A compiled statement: SQL text, its parameters and metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledQuery {
    sql: String,
    parameters: Vec<BoundParam>,
    metadata: QueryMetadata,
    dialect: Dialect,
}

impl CompiledQuery {
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn parameters(&self) -> &[BoundParam] {
        &self.parameters
    }

    /// Bound values in placeholder order.
    pub fn values(&self) -> impl Iterator<Item = &QueryValue> {
        self.parameters.iter().map(|p| &p.value)
    }

    #[must_use]
    pub fn metadata(&self) -> &QueryMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }
}

/// Server-side constraints applied on top of a client payload.
///
/// `table` replaces whatever the client named, `joins` replace the view's
/// predefined joins, and `scope` is ANDed in front of the client filter
/// (tenant pinning and similar). All of it is still checked against the
/// allowlist.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SecurityOverride {
    pub table: Option<String>,
    pub joins: Vec<JoinClause>,
    pub scope: Option<ConditionGroup<String>>,
}

impl SecurityOverride {
    #[must_use]
    pub fn pin_table(table: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_joins(mut self, joins: Vec<JoinClause>) -> Self {
        self.joins = joins;
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: ConditionGroup<String>) -> Self {
        self.scope = Some(scope);
        self
    }
}

/// `SELECT <select> FROM <table> WHERE <key_column> IN (<keys>)`.
#[derive(Clone, Copy, Debug)]
pub struct KeyLookup<'a> {
    pub table: &'a str,
    pub key_column: &'a str,
    pub select: &'a [String],
    pub keys: &'a [QueryValue],
}

/// A one-to-many relation fetched as one JSON array per parent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChildRelation {
    /// Child table; must be a base table in the allowlist.
    pub table: String,
    /// Child column referencing the parent key.
    pub foreign_key: String,
    /// Child columns placed into each JSON object.
    pub columns: Vec<String>,
    #[serde(default)]
    pub order_by: Vec<SortDescriptor<String>>,
}

/// `INSERT INTO <table> (<columns>) VALUES (<values>)`.
#[derive(Clone, Debug, PartialEq)]
pub struct InsertStatement {
    pub table: String,
    pub values: Vec<(String, QueryValue)>,
}

impl InsertStatement {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            values: Vec::new(),
        }
    }

    #[must_use]
    pub fn value(mut self, column: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.values.push((column.into(), value.into()));
        self
    }
}

struct Binder {
    dialect: Dialect,
    params: Vec<BoundParam>,
}

impl Binder {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    fn bind(&mut self, value: QueryValue, sql: &mut String) {
        let index = self.params.len() + 1;
        self.dialect.write_placeholder(index, sql);
        self.params.push(BoundParam {
            name: format!("p{index}"),
            value,
        });
    }

    fn bind_list(&mut self, values: &[QueryValue], sql: &mut String) {
        sql.push('(');
        for (i, v) in values.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            self.bind(v.clone(), sql);
        }
        sql.push(')');
    }
}

/// Resolved statement target.
struct Target<'c> {
    name: &'c str,
    access: &'c TableAccess,
    from_sql: String,
    joins: Vec<JoinClause>,
    is_view: bool,
}

fn render_table_ref(from: &TableRef) -> String {
    match &from.alias {
        Some(alias) => format!("{} AS {alias}", from.table),
        None => from.table.clone(),
    }
}

fn write_joins(joins: &[JoinClause], sql: &mut String) {
    for join in joins {
        sql.push(' ');
        sql.push_str(join.join_type.sql());
        sql.push(' ');
        sql.push_str(&join.table);
        if let Some(alias) = &join.alias {
            sql.push_str(" AS ");
            sql.push_str(alias);
        }
        sql.push_str(" ON ");
        sql.push_str(&join.on);
    }
}

/// Compiles payloads against one allowlist for one dialect.
#[derive(Clone, Copy, Debug)]
pub struct QueryCompiler<'c> {
    config: &'c QueryConfig,
    dialect: Dialect,
}

impl<'c> QueryCompiler<'c> {
    #[must_use]
    pub fn new(config: &'c QueryConfig, dialect: Dialect) -> Self {
        Self { config, dialect }
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Compile a strict payload. The entity's table is the fallback target.
    ///
    /// # Errors
    ///
    /// [`CompileError::PolicyViolation`] for anything outside the allowlist,
    /// [`CompileError::MalformedPayload`] for structural problems.
    pub fn compile<F: EntityFields>(
        &self,
        payload: &QueryPayload<F>,
        security: Option<&SecurityOverride>,
    ) -> Result<CompiledQuery, CompileError> {
        self.compile_select(&payload.to_flexible(), Some(F::TABLE), security)
    }

    /// Compile a flexible payload; `from` (or the override) must name a
    /// table or view.
    ///
    /// # Errors
    ///
    /// Same as [`Self::compile`].
    pub fn compile_join(
        &self,
        payload: &JoinQueryPayload,
        security: Option<&SecurityOverride>,
    ) -> Result<CompiledQuery, CompileError> {
        self.compile_select(payload, None, security)
    }

    /// Compile either payload variant.
    ///
    /// # Errors
    ///
    /// Same as [`Self::compile`].
    pub fn compile_any<F: EntityFields>(
        &self,
        payload: &AnyPayload<F>,
        security: Option<&SecurityOverride>,
    ) -> Result<CompiledQuery, CompileError> {
        match payload {
            AnyPayload::Strict(p) => self.compile(p, security),
            AnyPayload::Flexible(p) => self.compile_join(p, security),
        }
    }

    /// Compile a lookup of the rows whose `key_column` is in `keys`.
    ///
    /// The key column is added to the projection when not requested, so the
    /// caller can match rows back to keys.
    ///
    /// # Errors
    ///
    /// [`CompileError::MalformedPayload`] when `keys` or `select` is empty,
    /// [`CompileError::PolicyViolation`] for unknown tables or columns.
    pub fn compile_key_lookup(
        &self,
        lookup: &KeyLookup<'_>,
        security: Option<&SecurityOverride>,
    ) -> Result<CompiledQuery, CompileError> {
        let result = self.key_lookup_inner(lookup, security);
        log_rejection(&result);
        result
    }

    /// Compile the child fetch of a batch load: one row per parent key with
    /// its children aggregated into a JSON array by the database.
    ///
    /// # Errors
    ///
    /// [`CompileError::MalformedPayload`] for empty keys/columns or a view
    /// target, [`CompileError::PolicyViolation`] for unknown tables or
    /// columns, [`CompileError::Unsupported`] on SQL Server.
    pub fn compile_child_aggregate(
        &self,
        relation: &ChildRelation,
        keys: &[QueryValue],
    ) -> Result<CompiledQuery, CompileError> {
        let result = self.child_aggregate_inner(relation, keys);
        log_rejection(&result);
        result
    }

    /// Compile a single-row insert into an allowlisted base table.
    ///
    /// # Errors
    ///
    /// [`CompileError::PolicyViolation`] for unknown tables, views or
    /// columns, [`CompileError::MalformedPayload`] for empty or duplicate
    /// columns.
    pub fn compile_insert(
        &self,
        insert: &InsertStatement,
        security: Option<&SecurityOverride>,
    ) -> Result<CompiledQuery, CompileError> {
        let result = self.insert_inner(insert, security);
        log_rejection(&result);
        result
    }

    fn compile_select(
        &self,
        payload: &JoinQueryPayload,
        default_table: Option<&str>,
        security: Option<&SecurityOverride>,
    ) -> Result<CompiledQuery, CompileError> {
        let result = self.select_inner(payload, default_table, security);
        log_rejection(&result);
        result
    }

    fn select_inner(
        &self,
        payload: &JoinQueryPayload,
        default_table: Option<&str>,
        security: Option<&SecurityOverride>,
    ) -> Result<CompiledQuery, CompileError> {
        if payload.select.is_empty() {
            return Err(CompileError::malformed("select must list at least one column"));
        }
        if payload.limit == Some(0) {
            return Err(CompileError::malformed("limit must be a positive integer"));
        }
        if payload.limit.into_iter().chain(payload.offset).any(|n| n > MAX_PAGE_BOUND) {
            return Err(CompileError::malformed(
                "limit and offset must fit in a signed 64-bit integer",
            ));
        }

        let requested = security
            .and_then(|s| s.table.as_deref())
            .or(payload.from.as_deref())
            .or(default_table);
        let target = self.resolve_target(requested, &payload.joins, security)?;

        let (select_columns, entries) = resolve_select(target.access, &payload.select)?;

        let mut binder = Binder::new(self.dialect);
        let where_sql = self.write_where(
            target.access,
            security.and_then(|s| s.scope.as_ref()),
            payload.filter.as_ref(),
            &mut binder,
        )?;

        let mut order_terms = Vec::with_capacity(payload.order_by.len());
        for sort in &payload.order_by {
            let column = target
                .access
                .resolve(&sort.key)
                .ok_or_else(|| CompileError::denied(KeyPosition::Sort, sort.key.as_str()))?;
            order_terms.push(format!("{} {}", column.expression(), sort.direction.sql()));
        }

        let mut sql = String::with_capacity(128);
        write_select_from(&target, &entries, &mut sql);
        if let Some(w) = &where_sql {
            sql.push_str(" WHERE ");
            sql.push_str(w);
        }
        if !order_terms.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_terms.join(", "));
        }
        self.dialect
            .write_pagination(payload.limit, payload.offset, !order_terms.is_empty(), &mut sql);

        Ok(self.finish(sql, binder, &target, select_columns, &entries, where_sql.is_some()))
    }

    fn key_lookup_inner(
        &self,
        lookup: &KeyLookup<'_>,
        security: Option<&SecurityOverride>,
    ) -> Result<CompiledQuery, CompileError> {
        if lookup.keys.is_empty() {
            return Err(CompileError::malformed("key lookup requires at least one key"));
        }
        if lookup.select.is_empty() {
            return Err(CompileError::malformed("select must list at least one column"));
        }
        let requested = security
            .and_then(|s| s.table.as_deref())
            .or(Some(lookup.table));
        let target = self.resolve_target(requested, &[], security)?;

        let key = target
            .access
            .resolve(lookup.key_column)
            .ok_or_else(|| CompileError::denied(KeyPosition::Filter, lookup.key_column))?;
        let (select_columns, mut entries) = resolve_select(target.access, lookup.select)?;
        if !entries.iter().any(|e| e.entry() == key.entry()) {
            entries.push(key);
        }

        let filter = ConditionGroup::and([Condition::new(
            key.expression().to_owned(),
            Predicate::In(lookup.keys.to_vec()),
        )]);
        let mut binder = Binder::new(self.dialect);
        let where_sql = self.write_where(
            target.access,
            security.and_then(|s| s.scope.as_ref()),
            Some(&filter),
            &mut binder,
        )?;

        let mut sql = String::with_capacity(128);
        write_select_from(&target, &entries, &mut sql);
        if let Some(w) = &where_sql {
            sql.push_str(" WHERE ");
            sql.push_str(w);
        }
        Ok(self.finish(sql, binder, &target, select_columns, &entries, true))
    }

    fn child_aggregate_inner(
        &self,
        relation: &ChildRelation,
        keys: &[QueryValue],
    ) -> Result<CompiledQuery, CompileError> {
        if keys.is_empty() {
            return Err(CompileError::malformed("child fetch requires at least one key"));
        }
        if relation.columns.is_empty() {
            return Err(CompileError::malformed("child relation must list at least one column"));
        }
        let access = self
            .config
            .table(&relation.table)
            .ok_or_else(|| CompileError::denied(KeyPosition::Table, relation.table.as_str()))?;
        if self.config.join_configuration(&relation.table).is_some() {
            return Err(CompileError::malformed("child relation must target a base table"));
        }

        let fk = plain_column(access, &relation.foreign_key, KeyPosition::Filter)?;
        let mut object_columns: Vec<(&str, &str)> = Vec::with_capacity(relation.columns.len());
        let mut seen = HashSet::new();
        for key in &relation.columns {
            let column = plain_column(access, key, KeyPosition::Select)?;
            if seen.insert(column) {
                object_columns.push((column, column));
            }
        }
        let mut order_terms = Vec::with_capacity(relation.order_by.len());
        for sort in &relation.order_by {
            order_terms.push((
                plain_column(access, &sort.key, KeyPosition::Sort)?,
                sort.direction.sql(),
            ));
        }

        // Derived table columns: fk, object columns, then sort-only columns.
        let mut inner_columns = vec![fk];
        for column in object_columns
            .iter()
            .map(|(c, _)| *c)
            .chain(order_terms.iter().map(|(c, _)| *c))
        {
            if !inner_columns.contains(&column) {
                inner_columns.push(column);
            }
        }

        let mut binder = Binder::new(self.dialect);
        let mut sql = String::with_capacity(256);
        sql.push_str(&format!("SELECT {SOURCE_ALIAS}.{fk} AS {PARENT_KEY_COLUMN}, "));

        let in_aggregate_order = (self.dialect == Dialect::Postgres && !order_terms.is_empty())
            .then(|| {
                order_terms
                    .iter()
                    .map(|(c, d)| format!("{SOURCE_ALIAS}.{c} {d}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            });
        aggregate::write_children_aggregate(
            self.dialect,
            SOURCE_ALIAS,
            &object_columns,
            in_aggregate_order.as_deref(),
            &mut sql,
        )?;

        sql.push_str(" FROM (SELECT ");
        sql.push_str(&inner_columns.join(", "));
        sql.push_str(" FROM ");
        sql.push_str(&relation.table);
        sql.push_str(" WHERE ");
        sql.push_str(fk);
        sql.push_str(" IN ");
        binder.bind_list(keys, &mut sql);
        if in_aggregate_order.is_none() && !order_terms.is_empty() {
            sql.push_str(" ORDER BY ");
            let terms: Vec<String> = order_terms.iter().map(|(c, d)| format!("{c} {d}")).collect();
            sql.push_str(&terms.join(", "));
        }
        sql.push_str(&format!(") AS {SOURCE_ALIAS} GROUP BY {SOURCE_ALIAS}.{fk}"));

        let parameter_count = binder.params.len();
        Ok(CompiledQuery {
            sql,
            parameters: binder.params,
            metadata: QueryMetadata {
                select_columns: relation.columns.clone(),
                result_columns: vec![
                    PARENT_KEY_COLUMN.to_owned(),
                    aggregate::CHILDREN_COLUMN.to_owned(),
                ],
                has_joins: false,
                has_where: true,
                parameter_count,
                table: relation.table.clone(),
            },
            dialect: self.dialect,
        })
    }

    fn insert_inner(
        &self,
        insert: &InsertStatement,
        security: Option<&SecurityOverride>,
    ) -> Result<CompiledQuery, CompileError> {
        let table = security
            .and_then(|s| s.table.as_deref())
            .unwrap_or(insert.table.as_str());
        let access = self
            .config
            .table(table)
            .ok_or_else(|| CompileError::denied(KeyPosition::Table, table))?;
        if self.config.join_configuration(table).is_some() {
            return Err(CompileError::denied(KeyPosition::Table, table));
        }
        if insert.values.is_empty() {
            return Err(CompileError::malformed("insert must set at least one column"));
        }

        let mut columns: Vec<&str> = Vec::with_capacity(insert.values.len());
        for (key, _) in &insert.values {
            let column = access
                .resolve(key)
                .filter(|c| c.is_plain())
                .ok_or_else(|| CompileError::denied(KeyPosition::Column, key.as_str()))?;
            if columns.contains(&column.expression()) {
                return Err(CompileError::malformed(format!("column `{key}` is set twice")));
            }
            columns.push(column.expression());
        }

        let mut binder = Binder::new(self.dialect);
        let mut sql = format!("INSERT INTO {table} ({}) VALUES ", columns.join(", "));
        let values: Vec<QueryValue> = insert.values.iter().map(|(_, v)| v.clone()).collect();
        binder.bind_list(&values, &mut sql);

        let parameter_count = binder.params.len();
        Ok(CompiledQuery {
            sql,
            parameters: binder.params,
            metadata: QueryMetadata {
                select_columns: columns.iter().map(|c| (*c).to_owned()).collect(),
                result_columns: Vec::new(),
                has_joins: false,
                has_where: false,
                parameter_count,
                table: table.to_owned(),
            },
            dialect: self.dialect,
        })
    }

    fn resolve_target(
        &self,
        requested: Option<&str>,
        client_joins: &[JoinClause],
        security: Option<&SecurityOverride>,
    ) -> Result<Target<'c>, CompileError> {
        let requested =
            requested.ok_or_else(|| CompileError::malformed("no table or view specified"))?;
        let (name, access) = self
            .config
            .table_entry(requested)
            .ok_or_else(|| CompileError::denied(KeyPosition::Table, requested))?;

        let view = self.config.join_configuration(name);
        let (from_sql, configured) = match view {
            Some(v) => (render_table_ref(&v.from), v.joins.as_slice()),
            None => (name.to_owned(), &[][..]),
        };
        let override_joins = security.map_or(&[][..], |s| s.joins.as_slice());

        for join in client_joins {
            if !configured.contains(join) && !override_joins.contains(join) {
                return Err(CompileError::denied(KeyPosition::Join, join.table.as_str()));
            }
        }

        let joins = if override_joins.is_empty() {
            configured.to_vec()
        } else {
            override_joins.to_vec()
        };
        Ok(Target {
            name,
            access,
            from_sql,
            joins,
            is_view: view.is_some(),
        })
    }

    /// Renders `scope AND filter`, dropping empty parts.
    fn write_where(
        &self,
        access: &TableAccess,
        scope: Option<&ConditionGroup<String>>,
        filter: Option<&ConditionGroup<String>>,
        binder: &mut Binder,
    ) -> Result<Option<String>, CompileError> {
        let mut parts = Vec::with_capacity(2);
        for group in [scope, filter].into_iter().flatten() {
            if let Some(sql) = self.write_group(access, group, 1, binder)? {
                parts.push(sql);
            }
        }
        Ok((!parts.is_empty()).then(|| parts.join(" AND ")))
    }

    fn write_group(
        &self,
        access: &TableAccess,
        group: &ConditionGroup<String>,
        depth: usize,
        binder: &mut Binder,
    ) -> Result<Option<String>, CompileError> {
        let max = self.config.max_condition_depth();
        if depth > max {
            return Err(CompileError::malformed(format!(
                "condition tree exceeds the maximum depth of {max}"
            )));
        }

        let mut parts = Vec::with_capacity(group.conditions.len());
        for node in &group.conditions {
            match node {
                ConditionNode::Condition(c) => parts.push(write_condition(access, c, binder)?),
                ConditionNode::Group(g) => {
                    if let Some(sql) = self.write_group(access, g, depth + 1, binder)? {
                        parts.push(sql);
                    }
                }
            }
        }
        if parts.is_empty() {
            return Ok(None);
        }
        Ok(Some(match group.operator {
            GroupOperator::And => format!("({})", parts.join(" AND ")),
            GroupOperator::Or => format!("({})", parts.join(" OR ")),
            GroupOperator::Not => format!("NOT ({})", parts.join(" AND ")),
        }))
    }

    fn finish(
        &self,
        sql: String,
        binder: Binder,
        target: &Target<'_>,
        select_columns: Vec<String>,
        entries: &[&AllowedColumn],
        has_where: bool,
    ) -> CompiledQuery {
        tracing::trace!(table = target.name, view = target.is_view, sql = %sql, "compiled query");
        let parameter_count = binder.params.len();
        CompiledQuery {
            sql,
            parameters: binder.params,
            metadata: QueryMetadata {
                select_columns,
                result_columns: entries.iter().map(|e| e.output_name().to_owned()).collect(),
                has_joins: !target.joins.is_empty(),
                has_where,
                parameter_count,
                table: target.name.to_owned(),
            },
            dialect: self.dialect,
        }
    }
}

/// Deduplicated select keys plus the allowlist entries they render as.
fn resolve_select<'a>(
    access: &'a TableAccess,
    select: &[String],
) -> Result<(Vec<String>, Vec<&'a AllowedColumn>), CompileError> {
    let mut keys: Vec<String> = Vec::with_capacity(select.len());
    let mut entries: Vec<&AllowedColumn> = Vec::with_capacity(select.len());
    for key in select {
        if keys.contains(key) {
            continue;
        }
        let column = access
            .resolve(key)
            .ok_or_else(|| CompileError::denied(KeyPosition::Select, key.as_str()))?;
        keys.push(key.clone());
        if !entries.iter().any(|e| e.entry() == column.entry()) {
            entries.push(column);
        }
    }
    Ok((keys, entries))
}

fn plain_column<'a>(
    access: &'a TableAccess,
    key: &str,
    position: KeyPosition,
) -> Result<&'a str, CompileError> {
    let column = access
        .resolve(key)
        .ok_or_else(|| CompileError::denied(position, key))?;
    if column.is_plain() {
        Ok(column.expression())
    } else {
        Err(CompileError::malformed(
            "child relation columns must be plain column names",
        ))
    }
}

fn write_select_from(target: &Target<'_>, entries: &[&AllowedColumn], sql: &mut String) {
    sql.push_str("SELECT ");
    for (i, e) in entries.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push_str(e.entry());
    }
    sql.push_str(" FROM ");
    sql.push_str(&target.from_sql);
    write_joins(&target.joins, sql);
}

fn write_condition(
    access: &TableAccess,
    condition: &Condition<String>,
    binder: &mut Binder,
) -> Result<String, CompileError> {
    let column = access
        .resolve(&condition.key)
        .ok_or_else(|| CompileError::denied(KeyPosition::Filter, condition.key.as_str()))?;

    let mut sql = String::with_capacity(column.expression().len() + 16);
    sql.push_str(column.expression());
    sql.push(' ');
    sql.push_str(condition.predicate.operator().sql());
    match &condition.predicate {
        Predicate::Equals(v)
        | Predicate::NotEquals(v)
        | Predicate::Gt(v)
        | Predicate::Lt(v)
        | Predicate::Gte(v)
        | Predicate::Lte(v) => {
            sql.push(' ');
            binder.bind(v.clone(), &mut sql);
        }
        Predicate::In(values) | Predicate::NotIn(values) => {
            if values.is_empty() {
                return Err(CompileError::malformed(format!(
                    "{} requires a non-empty list",
                    condition.predicate.operator()
                )));
            }
            sql.push(' ');
            binder.bind_list(values, &mut sql);
        }
        Predicate::Like(pattern) => {
            sql.push(' ');
            binder.bind(QueryValue::Text(pattern.clone()), &mut sql);
        }
        Predicate::IsNull | Predicate::IsNotNull => {}
    }
    Ok(sql)
}

fn log_rejection(result: &Result<CompiledQuery, CompileError>) {
    match result {
        Err(err @ CompileError::PolicyViolation { .. }) => {
            tracing::warn!(error = %err, "query rejected by allowlist");
        }
        Err(err) => tracing::debug!(error = %err, "query rejected"),
        Ok(_) => {}
    }
}
