#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Query grammar, allowlist policy and SQL compiler.
//!
//! This crate is pure: it never touches a database. Client payloads
//! ([`QueryPayload`], [`JoinQueryPayload`]) are compiled by a
//! [`QueryCompiler`] against a server-owned [`QueryConfig`] into a
//! [`CompiledQuery`] carrying SQL text and bound parameters.

pub mod aggregate;
pub mod compiler;
pub mod config;
pub mod dialect;
pub mod error;
pub mod grammar;
pub mod value;

pub use aggregate::{CHILDREN_COLUMN, PARENT_KEY_COLUMN};
pub use compiler::{
    BoundParam, ChildRelation, CompiledQuery, InsertStatement, KeyLookup, QueryCompiler,
    QueryMetadata, SecurityOverride,
};
pub use config::{
    AllowedColumn, DEFAULT_MAX_CONDITION_DEPTH, JoinConfiguration, QueryConfig,
    QueryConfigBuilder, TableAccess, TableRef,
};
pub use dialect::Dialect;
pub use error::{CompileError, ConfigError, KeyPosition};
pub use grammar::{
    AnyPayload, Condition, ConditionGroup, ConditionNode, EntityFields, GroupOperator,
    JoinClause, JoinQueryPayload, JoinType, Operator, Predicate, QueryPayload, RawCondition,
    SortDescriptor, SortDirection,
};
pub use value::QueryValue;
