use std::fmt;

use serde::{Deserialize, Serialize};

/// SQL dialect a query is rendered for.
///
/// Controls placeholder syntax and pagination. Every dialect except
/// `MsSql` has a matching sea-orm backend; `MsSql` is compile-only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    MySql,
    Sqlite,
    MsSql,
}

impl Dialect {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
            Self::MsSql => "mssql",
        }
    }

    /// Placeholder for the `index`-th (1-based) bound parameter.
    ///
    /// - Postgres: `$1`
    /// - SQLite: `?1`
    /// - MySQL: `?`
    /// - SQL Server: `@p1`
    pub(crate) fn write_placeholder(self, index: usize, sql: &mut String) {
        match self {
            Self::Postgres => {
                sql.push('$');
                sql.push_str(&index.to_string());
            }
            Self::Sqlite => {
                sql.push('?');
                sql.push_str(&index.to_string());
            }
            Self::MySql => sql.push('?'),
            Self::MsSql => {
                sql.push_str("@p");
                sql.push_str(&index.to_string());
            }
        }
    }

    /// Appends the pagination clause. Nothing is written when both bounds are
    /// absent; a missing offset is rendered as 0.
    pub(crate) fn write_pagination(
        self,
        limit: Option<u64>,
        offset: Option<u64>,
        has_order: bool,
        sql: &mut String,
    ) {
        if limit.is_none() && offset.is_none() {
            return;
        }
        let offset = offset.unwrap_or(0);
        match self {
            Self::Postgres | Self::MsSql => {
                // SQL Server only accepts OFFSET/FETCH after an ORDER BY.
                if self == Self::MsSql && !has_order {
                    sql.push_str(" ORDER BY (SELECT NULL)");
                }
                sql.push_str(&format!(" OFFSET {offset} ROWS"));
                if let Some(limit) = limit {
                    sql.push_str(&format!(" FETCH NEXT {limit} ROWS ONLY"));
                }
            }
            Self::Sqlite => match limit {
                Some(limit) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
                None => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            },
            Self::MySql => match limit {
                Some(limit) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
                None => sql.push_str(&format!(" LIMIT {} OFFSET {offset}", u64::MAX)),
            },
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
