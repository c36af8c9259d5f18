//! Query grammar.
//!
//! The wire shapes clients send: conditions, condition groups, sort
//! descriptors, join clauses and the two payload variants. Everything here is
//! plain data; policy checks and SQL rendering live in [`crate::compiler`].
//!
//! A condition's operator and its argument are a single closed enum
//! ([`Predicate`]), so an `IN` without a list or an `IS_NULL` with a value
//! cannot be constructed. The `{ "key", "operator", "value" }` wire form is
//! parsed through [`RawCondition`], which rejects mismatched shapes.

use std::fmt;
use std::hash::Hash;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};

use crate::value::QueryValue;

/// Comparison operators accepted on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Equals,
    NotEquals,
    Gt,
    Lt,
    Gte,
    Lte,
    In,
    NotIn,
    Like,
    IsNull,
    IsNotNull,
}

impl Operator {
    /// SQL token for this operator.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::NotEquals => "<>",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Like => "LIKE",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }

    /// Wire name of this operator.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Equals => "EQUALS",
            Self::NotEquals => "NOT_EQUALS",
            Self::Gt => "GT",
            Self::Lt => "LT",
            Self::Gte => "GTE",
            Self::Lte => "LTE",
            Self::In => "IN",
            Self::NotIn => "NOT_IN",
            Self::Like => "LIKE",
            Self::IsNull => "IS_NULL",
            Self::IsNotNull => "IS_NOT_NULL",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// An operator together with its argument.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Equals(QueryValue),
    NotEquals(QueryValue),
    Gt(QueryValue),
    Lt(QueryValue),
    Gte(QueryValue),
    Lte(QueryValue),
    /// Set membership. The compiler rejects an empty list.
    In(Vec<QueryValue>),
    NotIn(Vec<QueryValue>),
    /// Pattern match; the pattern is bound like any other value.
    Like(String),
    IsNull,
    IsNotNull,
}

impl Predicate {
    #[must_use]
    pub const fn operator(&self) -> Operator {
        match self {
            Self::Equals(_) => Operator::Equals,
            Self::NotEquals(_) => Operator::NotEquals,
            Self::Gt(_) => Operator::Gt,
            Self::Lt(_) => Operator::Lt,
            Self::Gte(_) => Operator::Gte,
            Self::Lte(_) => Operator::Lte,
            Self::In(_) => Operator::In,
            Self::NotIn(_) => Operator::NotIn,
            Self::Like(_) => Operator::Like,
            Self::IsNull => Operator::IsNull,
            Self::IsNotNull => Operator::IsNotNull,
        }
    }

    fn from_wire(operator: Operator, value: Option<serde_json::Value>) -> Result<Self, String> {
        let value = value.filter(|v| !v.is_null());
        match operator {
            Operator::IsNull | Operator::IsNotNull => {
                if value.is_some() {
                    return Err(format!("{operator} does not take a value"));
                }
                Ok(if operator == Operator::IsNull {
                    Self::IsNull
                } else {
                    Self::IsNotNull
                })
            }
            Operator::In | Operator::NotIn => {
                let Some(serde_json::Value::Array(items)) = value else {
                    return Err(format!("{operator} requires a list value"));
                };
                if items.is_empty() {
                    return Err(format!("{operator} requires a non-empty list"));
                }
                let values = items
                    .iter()
                    .map(QueryValue::from_json)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| format!("{operator}: {e}"))?;
                Ok(if operator == Operator::In {
                    Self::In(values)
                } else {
                    Self::NotIn(values)
                })
            }
            Operator::Like => match value {
                Some(serde_json::Value::String(pattern)) => Ok(Self::Like(pattern)),
                _ => Err("LIKE requires a string value".to_owned()),
            },
            Operator::Equals
            | Operator::NotEquals
            | Operator::Gt
            | Operator::Lt
            | Operator::Gte
            | Operator::Lte => {
                let Some(raw) = value else {
                    return Err(format!("{operator} requires a non-null value"));
                };
                let v = QueryValue::from_json(&raw).map_err(|e| format!("{operator}: {e}"))?;
                Ok(match operator {
                    Operator::Equals => Self::Equals(v),
                    Operator::NotEquals => Self::NotEquals(v),
                    Operator::Gt => Self::Gt(v),
                    Operator::Lt => Self::Lt(v),
                    Operator::Gte => Self::Gte(v),
                    _ => Self::Lte(v),
                })
            }
        }
    }

    fn to_wire(&self) -> Option<serde_json::Value> {
        match self {
            Self::Equals(v)
            | Self::NotEquals(v)
            | Self::Gt(v)
            | Self::Lt(v)
            | Self::Gte(v)
            | Self::Lte(v) => Some(v.to_json()),
            Self::In(vs) | Self::NotIn(vs) => Some(serde_json::Value::Array(
                vs.iter().map(QueryValue::to_json).collect(),
            )),
            Self::Like(p) => Some(serde_json::Value::String(p.clone())),
            Self::IsNull | Self::IsNotNull => None,
        }
    }
}

/// Wire form of a [`Condition`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawCondition<K> {
    pub key: K,
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

/// A single filter: `key <operator> value`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCondition<K>", into = "RawCondition<K>")]
pub struct Condition<K: Clone> {
    pub key: K,
    pub predicate: Predicate,
}

impl<K: Clone> Condition<K> {
    #[must_use]
    pub fn new(key: K, predicate: Predicate) -> Self {
        Self { key, predicate }
    }

    /// `key = value`
    #[must_use]
    pub fn eq(key: K, value: impl Into<QueryValue>) -> Self {
        Self::new(key, Predicate::Equals(value.into()))
    }

    /// `key IN (values)`
    #[must_use]
    pub fn is_in<V: Into<QueryValue>>(key: K, values: impl IntoIterator<Item = V>) -> Self {
        Self::new(key, Predicate::In(values.into_iter().map(Into::into).collect()))
    }

    /// Rewrites the key, keeping the predicate.
    #[must_use]
    pub fn map_key<L: Clone>(&self, f: &impl Fn(&K) -> L) -> Condition<L> {
        Condition {
            key: f(&self.key),
            predicate: self.predicate.clone(),
        }
    }
}

impl<K: Clone> TryFrom<RawCondition<K>> for Condition<K> {
    type Error = String;

    fn try_from(raw: RawCondition<K>) -> Result<Self, Self::Error> {
        Ok(Self {
            key: raw.key,
            predicate: Predicate::from_wire(raw.operator, raw.value)?,
        })
    }
}

impl<K: Clone> From<Condition<K>> for RawCondition<K> {
    fn from(c: Condition<K>) -> Self {
        Self {
            operator: c.predicate.operator(),
            value: c.predicate.to_wire(),
            key: c.key,
        }
    }
}

/// Logical connective of a [`ConditionGroup`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupOperator {
    And,
    Or,
    /// Negates the conjunction of all children.
    Not,
}

/// A recursive group of conditions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, bound(deserialize = "K: DeserializeOwned"))]
pub struct ConditionGroup<K: Clone> {
    pub operator: GroupOperator,
    #[serde(default)]
    pub conditions: Vec<ConditionNode<K>>,
}

impl<K: Clone> ConditionGroup<K> {
    #[must_use]
    pub fn new(operator: GroupOperator, conditions: Vec<ConditionNode<K>>) -> Self {
        Self {
            operator,
            conditions,
        }
    }

    #[must_use]
    pub fn and(conditions: impl IntoIterator<Item = impl Into<ConditionNode<K>>>) -> Self {
        Self::new(
            GroupOperator::And,
            conditions.into_iter().map(Into::into).collect(),
        )
    }

    #[must_use]
    pub fn or(conditions: impl IntoIterator<Item = impl Into<ConditionNode<K>>>) -> Self {
        Self::new(
            GroupOperator::Or,
            conditions.into_iter().map(Into::into).collect(),
        )
    }

    #[must_use]
    pub fn not(conditions: impl IntoIterator<Item = impl Into<ConditionNode<K>>>) -> Self {
        Self::new(
            GroupOperator::Not,
            conditions.into_iter().map(Into::into).collect(),
        )
    }

    /// Nesting depth of this group; a group of plain conditions has depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + self
            .conditions
            .iter()
            .map(|node| match node {
                ConditionNode::Group(g) => g.depth(),
                ConditionNode::Condition(_) => 0,
            })
            .max()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn map_keys<L: Clone>(&self, f: &impl Fn(&K) -> L) -> ConditionGroup<L> {
        ConditionGroup {
            operator: self.operator,
            conditions: self
                .conditions
                .iter()
                .map(|node| match node {
                    ConditionNode::Condition(c) => ConditionNode::Condition(c.map_key(f)),
                    ConditionNode::Group(g) => ConditionNode::Group(g.map_keys(f)),
                })
                .collect(),
        }
    }
}

/// Either a leaf condition or a nested group.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConditionNode<K: Clone> {
    Condition(Condition<K>),
    Group(ConditionGroup<K>),
}

impl<'de, K: Clone + DeserializeOwned> Deserialize<'de> for ConditionNode<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Dispatch on shape so the leaf's validation error reaches the caller
        // instead of an opaque "no variant matched".
        // Group connectives never collide with leaf operator names.
        let value = serde_json::Value::deserialize(deserializer)?;
        let is_group = value.get("conditions").is_some()
            || matches!(
                value.get("operator").and_then(serde_json::Value::as_str),
                Some("AND" | "OR" | "NOT")
            );
        if is_group {
            serde_json::from_value(value)
                .map(Self::Group)
                .map_err(D::Error::custom)
        } else {
            serde_json::from_value(value)
                .map(Self::Condition)
                .map_err(D::Error::custom)
        }
    }
}

impl<K: Clone> From<Condition<K>> for ConditionNode<K> {
    fn from(c: Condition<K>) -> Self {
        Self::Condition(c)
    }
}

impl<K: Clone> From<ConditionGroup<K>> for ConditionNode<K> {
    fn from(g: ConditionGroup<K>) -> Self {
        Self::Group(g)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    #[serde(alias = "ASC")]
    Asc,
    #[serde(alias = "DESC")]
    Desc,
}

impl SortDirection {
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One `ORDER BY` term. Sequence order is tie-break precedence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SortDescriptor<K> {
    pub key: K,
    #[serde(default)]
    pub direction: SortDirection,
}

impl<K> SortDescriptor<K> {
    #[must_use]
    pub fn asc(key: K) -> Self {
        Self {
            key,
            direction: SortDirection::Asc,
        }
    }

    #[must_use]
    pub fn desc(key: K) -> Self {
        Self {
            key,
            direction: SortDirection::Desc,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
            Self::Full => "FULL JOIN",
        }
    }
}

/// A join between the base table and another table.
///
/// Only server-authored join clauses are ever rendered; a client-supplied one
/// is accepted only as a reference to a predefined join.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinClause {
    #[serde(rename = "type")]
    pub join_type: JoinType,
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub on: String,
}

/// Fields of an entity usable as typed query keys.
///
/// Implemented by a closed enum per entity, usually through
/// [`entity_fields!`](crate::entity_fields).
pub trait EntityFields: Copy + Eq + Hash + fmt::Debug {
    /// Allowlist entry (table or view) the fields belong to.
    const TABLE: &'static str;

    /// Column reference of this field as written in the allowlist.
    fn column(self) -> &'static str;
}

/// Declares a field enum implementing [`EntityFields`].
///
/// The generated enum derives `serde` traits, so the calling crate needs
/// `serde` among its dependencies.
///
/// ```
/// sqlgate_query::entity_fields! {
///     pub enum ItemField for "items" {
///         Id => "id",
///         Name => "name",
///         Status => "status",
///     }
/// }
/// ```
#[macro_export]
macro_rules! entity_fields {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident for $table:literal {
            $($variant:ident => $column:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        $vis enum $name {
            $(
                #[serde(rename = $column)]
                $variant,
            )+
        }

        impl $crate::EntityFields for $name {
            const TABLE: &'static str = $table;

            fn column(self) -> &'static str {
                match self {
                    $(Self::$variant => $column,)+
                }
            }
        }
    };
}

/// A query description.
///
/// `K` is the key type: an [`EntityFields`] enum for strict payloads or
/// `String` for [`JoinQueryPayload`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    rename_all = "camelCase",
    deny_unknown_fields,
    bound(deserialize = "K: DeserializeOwned")
)]
pub struct QueryPayload<K: Clone> {
    pub select: Vec<K>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub joins: Vec<JoinClause>,
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<ConditionGroup<K>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<SortDescriptor<K>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

/// Flexible payload: free-form keys such as `i.name` or `c.name AS category`,
/// checked against the allowlist at compile time.
pub type JoinQueryPayload = QueryPayload<String>;

impl<K: Clone> QueryPayload<K> {
    /// A payload selecting `select` with no filter, order or pagination.
    #[must_use]
    pub fn select(select: impl IntoIterator<Item = K>) -> Self {
        Self {
            select: select.into_iter().collect(),
            from: None,
            joins: Vec::new(),
            filter: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    #[must_use]
    pub fn from_table(mut self, table: impl Into<String>) -> Self {
        self.from = Some(table.into());
        self
    }

    #[must_use]
    pub fn filter(mut self, group: ConditionGroup<K>) -> Self {
        self.filter = Some(group);
        self
    }

    #[must_use]
    pub fn order_by(mut self, sort: SortDescriptor<K>) -> Self {
        self.order_by.push(sort);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Rewrites every key, keeping structure, joins and pagination.
    #[must_use]
    pub fn map_keys<L: Clone>(&self, f: impl Fn(&K) -> L) -> QueryPayload<L> {
        QueryPayload {
            select: self.select.iter().map(&f).collect(),
            from: self.from.clone(),
            joins: self.joins.clone(),
            filter: self.filter.as_ref().map(|g| g.map_keys(&f)),
            order_by: self
                .order_by
                .iter()
                .map(|s| SortDescriptor {
                    key: f(&s.key),
                    direction: s.direction,
                })
                .collect(),
            limit: self.limit,
            offset: self.offset,
        }
    }
}

impl<F: EntityFields> QueryPayload<F> {
    /// Converts a strict payload to the flexible form using column references.
    #[must_use]
    pub fn to_flexible(&self) -> JoinQueryPayload {
        self.map_keys(|f| f.column().to_owned())
    }
}

/// Either payload variant, tagged on the wire by `mode`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "mode",
    content = "payload",
    rename_all = "snake_case",
    bound(deserialize = "F: DeserializeOwned")
)]
pub enum AnyPayload<F: EntityFields> {
    Strict(QueryPayload<F>),
    Flexible(JoinQueryPayload),
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    crate::entity_fields! {
        enum ItemField for "items" {
            Id => "id",
            Name => "name",
        }
    }

    #[test]
    fn condition_parses_every_operator_shape() {
        let eq: Condition<String> =
            serde_json::from_value(json!({"key": "status", "operator": "EQUALS", "value": "open"}))
                .unwrap();
        assert_eq!(eq.predicate, Predicate::Equals("open".into()));

        let within: Condition<String> =
            serde_json::from_value(json!({"key": "id", "operator": "NOT_IN", "value": [1, 2]}))
                .unwrap();
        assert_eq!(within.predicate, Predicate::NotIn(vec![1.into(), 2.into()]));

        let null: Condition<String> =
            serde_json::from_value(json!({"key": "deleted_at", "operator": "IS_NULL"})).unwrap();
        assert_eq!(null.predicate, Predicate::IsNull);
    }

    #[test]
    fn condition_rejects_mismatched_shapes() {
        let cases = [
            json!({"key": "id", "operator": "IN", "value": []}),
            json!({"key": "id", "operator": "IN", "value": 3}),
            json!({"key": "id", "operator": "EQUALS"}),
            json!({"key": "id", "operator": "EQUALS", "value": null}),
            json!({"key": "id", "operator": "GT", "value": [1]}),
            json!({"key": "id", "operator": "LIKE", "value": 5}),
            json!({"key": "id", "operator": "IS_NOT_NULL", "value": 1}),
            json!({"key": "id", "operator": "BETWEEN", "value": 1}),
        ];
        for case in cases {
            assert!(
                serde_json::from_value::<Condition<String>>(case.clone()).is_err(),
                "accepted {case}"
            );
        }
    }

    #[test]
    fn nested_group_error_keeps_leaf_message() {
        let err = serde_json::from_value::<ConditionGroup<String>>(json!({
            "operator": "AND",
            "conditions": [{"key": "id", "operator": "IN", "value": []}]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("non-empty list"), "{err}");
    }

    #[test]
    fn nested_group_without_conditions_is_empty() {
        let group: ConditionGroup<String> = serde_json::from_value(json!({
            "operator": "AND",
            "conditions": [
                {"operator": "OR"},
                {"key": "id", "operator": "EQUALS", "value": 1}
            ]
        }))
        .unwrap();
        assert_eq!(
            group.conditions[0],
            ConditionNode::Group(ConditionGroup::new(GroupOperator::Or, Vec::new()))
        );
        assert!(matches!(group.conditions[1], ConditionNode::Condition(_)));

        let err = serde_json::from_value::<ConditionGroup<String>>(json!({
            "operator": "AND",
            "conditions": [{"operator": "EQUALS", "value": 1}]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("key"), "{err}");
    }

    #[test]
    fn condition_serializes_back_to_wire_form() {
        let c = Condition::eq("status".to_owned(), "open");
        assert_eq!(
            serde_json::to_value(&c).unwrap(),
            json!({"key": "status", "operator": "EQUALS", "value": "open"})
        );
        let null = Condition::new("x".to_owned(), Predicate::IsNull);
        assert_eq!(
            serde_json::to_value(&null).unwrap(),
            json!({"key": "x", "operator": "IS_NULL"})
        );
    }

    #[test]
    fn group_depth_counts_nesting() {
        let leaf = Condition::eq("a".to_owned(), 1_i64);
        let inner = ConditionGroup::and([leaf.clone()]);
        let outer = ConditionGroup::or(vec![ConditionNode::from(leaf), inner.into()]);
        assert_eq!(outer.depth(), 2);
        assert_eq!(ConditionGroup::<String>::and(Vec::<Condition<String>>::new()).depth(), 1);
    }

    #[test]
    fn payload_parses_camel_case_wire_form() {
        let p: JoinQueryPayload = serde_json::from_value(json!({
            "select": ["id", "name"],
            "where": {"operator": "AND", "conditions": [
                {"key": "status", "operator": "EQUALS", "value": "active"}
            ]},
            "orderBy": [{"key": "name", "direction": "asc"}],
            "limit": 10
        }))
        .unwrap();
        assert_eq!(p.select, vec!["id", "name"]);
        assert_eq!(p.order_by, vec![SortDescriptor::asc("name".to_owned())]);
        assert_eq!(p.limit, Some(10));
        assert!(p.offset.is_none());
    }

    #[test]
    fn payload_rejects_unknown_fields_and_negative_limit() {
        assert!(serde_json::from_value::<JoinQueryPayload>(json!({"select": ["id"], "groupBy": ["id"]})).is_err());
        assert!(serde_json::from_value::<JoinQueryPayload>(json!({"select": ["id"], "limit": -1})).is_err());
    }

    #[test]
    fn strict_payload_rejects_undeclared_fields() {
        let ok: QueryPayload<ItemField> =
            serde_json::from_value(json!({"select": ["id", "name"]})).unwrap();
        assert_eq!(ok.select, vec![ItemField::Id, ItemField::Name]);
        assert!(
            serde_json::from_value::<QueryPayload<ItemField>>(json!({"select": ["secret_column"]}))
                .is_err()
        );
    }

    #[test]
    fn any_payload_is_tagged_by_mode() {
        let strict: AnyPayload<ItemField> = serde_json::from_value(json!({
            "mode": "strict", "payload": {"select": ["id"]}
        }))
        .unwrap();
        assert!(matches!(strict, AnyPayload::Strict(_)));

        let flexible: AnyPayload<ItemField> = serde_json::from_value(json!({
            "mode": "flexible", "payload": {"select": ["i.id"], "from": "item_view"}
        }))
        .unwrap();
        assert!(matches!(flexible, AnyPayload::Flexible(_)));
    }

    #[test]
    fn strict_payload_converts_to_column_keys() {
        let p = QueryPayload::select([ItemField::Id, ItemField::Name])
            .filter(ConditionGroup::and([Condition::eq(ItemField::Name, "x")]))
            .order_by(SortDescriptor::desc(ItemField::Id));
        let flex = p.to_flexible();
        assert_eq!(flex.select, vec!["id", "name"]);
        assert_eq!(flex.order_by[0].key, "id");
    }
}
