use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sqlgate_api::QueryService;
use sqlgate_db::Db;
use tracing_subscriber::EnvFilter;

mod config;

use config::{AppConfig, LoggingConfig};

/// sqlgate: allow-listed declarative queries over HTTP.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

fn init_logging(cfg: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if cfg.json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = AppConfig::load(cli.config.as_deref())?;

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&cfg)?);
        return Ok(());
    }

    init_logging(&cfg.logging);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        tables = cfg.query.table_names().count(),
        recipes = cfg.batch.len(),
        "starting sqlgate"
    );

    let db = Db::connect(&cfg.database.dsn, &cfg.database.pool)
        .await
        .context("connecting to the database")?;
    let service = QueryService::new(
        db,
        Arc::new(cfg.query),
        cfg.batch,
        cfg.limits,
        cfg.server.expose_sql,
    );
    let app = sqlgate_api::router(Arc::new(service));

    let listener = tokio::net::TcpListener::bind(&cfg.server.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.server.bind_addr))?;
    tracing::info!(addr = %cfg.server.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}
