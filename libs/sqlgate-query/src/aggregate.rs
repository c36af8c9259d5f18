//! Dialect-specific JSON aggregation.
//!
//! Child rows are folded into one JSON array per parent by the database, so a
//! whole page of parents needs a single round-trip for its children. Every
//! dialect returns the array as text; callers parse it.

use crate::dialect::Dialect;
use crate::error::CompileError;

/// Result column holding the parent key.
pub const PARENT_KEY_COLUMN: &str = "parent_key";
/// Result column holding the JSON array of children.
pub const CHILDREN_COLUMN: &str = "children";

/// Alias of the ordered derived table the aggregate reads from.
pub(crate) const SOURCE_ALIAS: &str = "agg_src";

/// Writes the `json_object('k', col, ...)` expression over `columns`
/// (`(output_name, column)` pairs) qualified with `qualifier`.
fn write_json_object(
    dialect: Dialect,
    qualifier: &str,
    columns: &[(&str, &str)],
    sql: &mut String,
) {
    match dialect {
        Dialect::Postgres => sql.push_str("json_build_object("),
        Dialect::MySql => sql.push_str("JSON_OBJECT("),
        Dialect::Sqlite | Dialect::MsSql => sql.push_str("json_object("),
    }
    for (i, (name, column)) in columns.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push('\'');
        sql.push_str(name);
        sql.push_str("', ");
        sql.push_str(qualifier);
        sql.push('.');
        sql.push_str(column);
    }
    sql.push(')');
}

/// Writes the aggregate select expression `<json array agg> AS children`.
///
/// `order_by` is an already-validated `ORDER BY` body (without the keyword)
/// over `qualifier`-qualified columns; Postgres places it inside the
/// aggregate, other dialects rely on the ordered derived table.
///
/// # Errors
///
/// Returns [`CompileError::Unsupported`] for SQL Server.
pub(crate) fn write_children_aggregate(
    dialect: Dialect,
    qualifier: &str,
    columns: &[(&str, &str)],
    order_by: Option<&str>,
    sql: &mut String,
) -> Result<(), CompileError> {
    match dialect {
        Dialect::Postgres => {
            sql.push_str("COALESCE(json_agg(");
            write_json_object(dialect, qualifier, columns, sql);
            if let Some(order) = order_by {
                sql.push_str(" ORDER BY ");
                sql.push_str(order);
            }
            sql.push_str("), '[]'::json)::text");
        }
        Dialect::Sqlite => {
            sql.push_str("json_group_array(");
            write_json_object(dialect, qualifier, columns, sql);
            sql.push(')');
        }
        Dialect::MySql => {
            sql.push_str("CAST(JSON_ARRAYAGG(");
            write_json_object(dialect, qualifier, columns, sql);
            sql.push_str(") AS CHAR)");
        }
        Dialect::MsSql => {
            return Err(CompileError::Unsupported {
                feature: "child aggregation",
                dialect: dialect.name(),
            });
        }
    }
    sql.push_str(" AS ");
    sql.push_str(CHILDREN_COLUMN);
    Ok(())
}
