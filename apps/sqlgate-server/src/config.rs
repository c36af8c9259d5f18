use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use serde::{Deserialize, Serialize};
use sqlgate_db::{BatchRecipe, ConnectOpts, LimitCfg};
use sqlgate_query::QueryConfig;

/// Environment variables with this prefix override file values;
/// `__` separates nesting levels (`SQLGATE_DATABASE__DSN`).
pub const ENV_PREFIX: &str = "SQLGATE_";

fn default_bind_addr() -> String {
    "127.0.0.1:8087".to_owned()
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Include the generated SQL in success envelopes.
    #[serde(default = "default_true")]
    pub expose_sql: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            expose_sql: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub dsn: String,
    #[serde(default)]
    pub pool: ConnectOpts,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// The allowlist. Validated while loading.
    pub query: QueryConfig,
    #[serde(default)]
    pub batch: BTreeMap<String, BatchRecipe>,
    #[serde(default)]
    pub limits: LimitCfg,
}

impl AppConfig {
    /// Load `path` (if any) and apply `SQLGATE_` environment overrides.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, a value has the wrong shape, or the
    /// allowlist is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            anyhow::ensure!(path.exists(), "config file {} not found", path.display());
            figment = figment.merge(Yaml::file(path));
        }
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.limits.default > 0, "limits.default must be positive");
        anyhow::ensure!(
            self.limits.default <= self.limits.max,
            "limits.default exceeds limits.max"
        );
        for (name, recipe) in &self.batch {
            anyhow::ensure!(
                self.query.table(&recipe.view).is_some(),
                "batch recipe `{name}` uses view `{}` which is not allowlisted",
                recipe.view
            );
            anyhow::ensure!(
                self.query.table(&recipe.children.table).is_some(),
                "batch recipe `{name}` uses child table `{}` which is not allowlisted",
                recipe.children.table
            );
        }
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_yaml(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    const MINIMAL: &str = r#"
database:
  dsn: "sqlite::memory:"
query:
  allowed_tables:
    items: [id, name]
"#;

    #[test]
    fn minimal_file_gets_defaults() {
        let file = write_yaml(MINIMAL);
        let cfg = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.server.bind_addr, "127.0.0.1:8087");
        assert!(cfg.server.expose_sql);
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.limits, LimitCfg::default());
        assert!(cfg.batch.is_empty());
        assert!(cfg.query.table("items").is_some());
        assert_eq!(cfg.database.pool, ConnectOpts::default());
    }

    #[test]
    fn bundled_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/sqlgate.yaml");
        let cfg = AppConfig::load(Some(&path)).unwrap();
        assert!(cfg.query.join_configuration("item_with_category").is_some());
        assert_eq!(cfg.batch["items_with_comments"].children_field, "comments");
        assert_eq!(cfg.database.pool.max_conns, Some(8));
    }

    #[test]
    fn invalid_identifiers_fail_to_load() {
        let file = write_yaml(
            r#"
database:
  dsn: "sqlite::memory:"
query:
  allowed_tables:
    items: ["id; DROP TABLE items"]
"#,
        );
        assert!(AppConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let file = write_yaml(&format!("{MINIMAL}\nextra: 1\n"));
        assert!(AppConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn recipes_must_reference_allowlisted_tables() {
        let file = write_yaml(&format!(
            "{MINIMAL}
batch:
  broken:
    view: items
    primary_key: id
    children:
      table: comments
      foreign_key: item_id
      columns: [id]
"
        ));
        let err = AppConfig::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("broken"), "{err:#}");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(AppConfig::load(Some(Path::new("/nonexistent/sqlgate.yaml"))).is_err());
    }
}
