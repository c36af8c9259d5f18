//! Server-owned security policy.
//!
//! A [`QueryConfig`] lists every table (or view) a client may address, the
//! exact column references permitted on each, and the predefined joins that
//! make up a view. It is validated once when loaded and then shared
//! read-only (typically behind an `Arc`); nothing mutates it afterwards.
//!
//! ```yaml
//! allowed_tables:
//!   items: [id, name, status]
//!   item_with_category: [i.id, i.name, "c.name AS category_name"]
//! join_configurations:
//!   item_with_category:
//!     from: { table: items, alias: i }
//!     joins:
//!       - { type: LEFT, table: categories, alias: c, on: "c.id = i.category_id" }
//! max_condition_depth: 16
//! ```

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::grammar::JoinClause;

/// Default bound on condition-tree nesting.
pub const DEFAULT_MAX_CONDITION_DEPTH: usize = 16;

const IDENT: &str = "[A-Za-z_][A-Za-z0-9_]*";

#[allow(clippy::expect_used)]
static TABLE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^{IDENT}(?:\.{IDENT})?$")).expect("Invalid regex pattern")
});

#[allow(clippy::expect_used)]
static ALIAS_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^{IDENT}$")).expect("Invalid regex pattern"));

#[allow(clippy::expect_used)]
static COLUMN_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^\s*({IDENT}(?:\.{IDENT})?)(?:\s+(?i:AS)\s+({IDENT}))?\s*$"
    ))
    .expect("Invalid regex pattern")
});

#[allow(clippy::expect_used)]
static JOIN_ON: LazyLock<Regex> = LazyLock::new(|| {
    let col = format!(r"{IDENT}(?:\.{IDENT})?");
    let eq = format!(r"{col}\s*=\s*{col}");
    Regex::new(&format!(r"^\s*{eq}(?:\s+(?i:AND)\s+{eq})*\s*$")).expect("Invalid regex pattern")
});

fn default_max_condition_depth() -> usize {
    DEFAULT_MAX_CONDITION_DEPTH
}

/// Base table of a view, optionally aliased.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableRef {
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl TableRef {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: None,
        }
    }

    #[must_use]
    pub fn aliased(table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: Some(alias.into()),
        }
    }
}

/// Predefined joins that make up a named view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinConfiguration {
    pub from: TableRef,
    #[serde(default)]
    pub joins: Vec<JoinClause>,
}

/// One allowlisted column reference: `col`, `alias.col` or `alias.col AS name`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllowedColumn {
    entry: String,
    expression: String,
    alias: Option<String>,
}

impl AllowedColumn {
    /// Parse and normalise an allowlist entry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidIdentifier`] when the entry does not
    /// follow `ident(.ident)?( AS ident)?`.
    pub fn parse(entry: &str) -> Result<Self, ConfigError> {
        let caps = COLUMN_ENTRY
            .captures(entry)
            .ok_or_else(|| ConfigError::InvalidIdentifier {
                context: "column",
                value: entry.to_owned(),
            })?;
        let expression = caps.get(1).map(|m| m.as_str().to_owned()).unwrap_or_default();
        let alias = caps.get(2).map(|m| m.as_str().to_owned());
        let entry = match &alias {
            Some(a) => format!("{expression} AS {a}"),
            None => expression.clone(),
        };
        Ok(Self {
            entry,
            expression,
            alias,
        })
    }

    /// Normalised entry as rendered in a select list.
    #[must_use]
    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Column reference without the output alias.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    #[must_use]
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Name under which the column appears in a result row.
    #[must_use]
    pub fn output_name(&self) -> &str {
        match &self.alias {
            Some(a) => a,
            None => self
                .expression
                .rsplit_once('.')
                .map_or(self.expression.as_str(), |(_, col)| col),
        }
    }

    /// `true` for an unqualified, unaliased column name.
    #[must_use]
    pub fn is_plain(&self) -> bool {
        self.alias.is_none() && !self.expression.contains('.')
    }

    fn matches(&self, key: &str) -> bool {
        key == self.entry || key == self.expression || self.alias.as_deref() == Some(key)
    }
}

/// Columns permitted on one table or view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableAccess {
    columns: Vec<AllowedColumn>,
}

impl TableAccess {
    #[must_use]
    pub fn columns(&self) -> &[AllowedColumn] {
        &self.columns
    }

    /// Resolve a client key to its allowlist entry.
    ///
    /// A key matches an entry by its full text, its column reference or its
    /// output alias. Anything else is unknown.
    #[must_use]
    pub fn resolve(&self, key: &str) -> Option<&AllowedColumn> {
        if let Some(found) = self.columns.iter().find(|c| c.matches(key)) {
            return Some(found);
        }
        // Same entry with different spacing or `as` casing.
        let normalised = AllowedColumn::parse(key).ok()?;
        self.columns.iter().find(|c| c.entry == normalised.entry)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawQueryConfig {
    #[serde(default, alias = "allowedTables")]
    allowed_tables: BTreeMap<String, Vec<String>>,
    #[serde(default, alias = "joinConfigurations")]
    join_configurations: BTreeMap<String, JoinConfiguration>,
    #[serde(default = "default_max_condition_depth", alias = "maxConditionDepth")]
    max_condition_depth: usize,
}

impl Default for RawQueryConfig {
    fn default() -> Self {
        Self {
            allowed_tables: BTreeMap::new(),
            join_configurations: BTreeMap::new(),
            max_condition_depth: DEFAULT_MAX_CONDITION_DEPTH,
        }
    }
}

/// The allowlist. Immutable once built.
///
/// An empty config permits nothing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawQueryConfig", into = "RawQueryConfig")]
pub struct QueryConfig {
    tables: BTreeMap<String, TableAccess>,
    views: BTreeMap<String, JoinConfiguration>,
    max_condition_depth: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            tables: BTreeMap::new(),
            views: BTreeMap::new(),
            max_condition_depth: DEFAULT_MAX_CONDITION_DEPTH,
        }
    }
}

impl QueryConfig {
    #[must_use]
    pub fn builder() -> QueryConfigBuilder {
        QueryConfigBuilder::default()
    }

    /// Allowlist of a table or view, if the name is known.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableAccess> {
        self.tables.get(name)
    }

    /// Predefined joins of a view, if `name` is a view.
    #[must_use]
    pub fn join_configuration(&self, name: &str) -> Option<&JoinConfiguration> {
        self.views.get(name)
    }

    #[must_use]
    pub fn max_condition_depth(&self) -> usize {
        self.max_condition_depth
    }

    /// Allowlist entry with the config-owned name, for borrowing both.
    pub(crate) fn table_entry(&self, name: &str) -> Option<(&str, &TableAccess)> {
        self.tables
            .get_key_value(name)
            .map(|(name, access)| (name.as_str(), access))
    }

    /// Names of every allowlisted table and view.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

fn check_ident(re: &Regex, context: &'static str, value: &str) -> Result<(), ConfigError> {
    if re.is_match(value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier {
            context,
            value: value.to_owned(),
        })
    }
}

impl TryFrom<RawQueryConfig> for QueryConfig {
    type Error = ConfigError;

    fn try_from(raw: RawQueryConfig) -> Result<Self, Self::Error> {
        if raw.max_condition_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }

        let mut tables = BTreeMap::new();
        for (name, columns) in raw.allowed_tables {
            check_ident(&TABLE_NAME, "table", &name)?;
            if columns.is_empty() {
                return Err(ConfigError::EmptyAllowlist { table: name });
            }
            let columns = columns
                .iter()
                .map(|c| AllowedColumn::parse(c))
                .collect::<Result<Vec<_>, _>>()?;
            tables.insert(name, TableAccess { columns });
        }

        for (view, cfg) in &raw.join_configurations {
            if !tables.contains_key(view) {
                return Err(ConfigError::ViewWithoutAllowlist { view: view.clone() });
            }
            check_ident(&TABLE_NAME, "table", &cfg.from.table)?;
            if let Some(alias) = &cfg.from.alias {
                check_ident(&ALIAS_NAME, "alias", alias)?;
            }
            for join in &cfg.joins {
                check_ident(&TABLE_NAME, "table", &join.table)?;
                if let Some(alias) = &join.alias {
                    check_ident(&ALIAS_NAME, "alias", alias)?;
                }
                if !JOIN_ON.is_match(&join.on) {
                    return Err(ConfigError::UnsafeJoinCondition {
                        view: view.clone(),
                        on: join.on.clone(),
                    });
                }
            }
        }

        Ok(Self {
            tables,
            views: raw.join_configurations,
            max_condition_depth: raw.max_condition_depth,
        })
    }
}

impl From<QueryConfig> for RawQueryConfig {
    fn from(cfg: QueryConfig) -> Self {
        Self {
            allowed_tables: cfg
                .tables
                .into_iter()
                .map(|(name, access)| {
                    (
                        name,
                        access.columns.into_iter().map(|c| c.entry).collect(),
                    )
                })
                .collect(),
            join_configurations: cfg.views,
            max_condition_depth: cfg.max_condition_depth,
        }
    }
}

/// Programmatic construction of a [`QueryConfig`], validated on `build()`.
#[derive(Debug, Default)]
pub struct QueryConfigBuilder {
    raw: RawQueryConfig,
}

impl QueryConfigBuilder {
    #[must_use]
    pub fn allow_table<S: Into<String>>(
        mut self,
        name: impl Into<String>,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        self.raw
            .allowed_tables
            .insert(name.into(), columns.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn join_configuration(mut self, view: impl Into<String>, cfg: JoinConfiguration) -> Self {
        self.raw.join_configurations.insert(view.into(), cfg);
        self
    }

    #[must_use]
    pub fn max_condition_depth(mut self, depth: usize) -> Self {
        self.raw.max_condition_depth = depth;
        self
    }

    /// Validate and freeze the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for malformed identifiers, empty allowlists,
    /// views without an allowlist entry or unsupported join conditions.
    pub fn build(self) -> Result<QueryConfig, ConfigError> {
        QueryConfig::try_from(self.raw)
    }
}
