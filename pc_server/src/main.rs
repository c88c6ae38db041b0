//! Promo code giveaway server.
//!
//! Serves the OAuth login flow and the claim API over one key-value store,
//! PostgreSQL-backed by default.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Error};
use log::{info, warn};
use pc_server::{
    api,
    config::{ServerConfig, StoreConfig},
    logging, metrics,
};
use pico_args::Arguments;
use promo_codes::{
    claims::parse_code_list,
    db::Database,
    kv::{KvStore, MemoryKvStore, PgKvStore},
    oauth::HttpIdentityProvider,
};

const HELP: &str = "\
Run the promo code giveaway server

USAGE:
  pc_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:6970]
  --db-url     URL         Database connection string  [default: env DATABASE_URL or postgres://postgres@localhost/promo_codes]
  --seed-file  PATH        Load codes (one per line, # comments) into the pool before serving

FLAGS:
  --memory-store           Keep all state in process memory (development only)
  -h, --help               Print help information

ENVIRONMENT:
  OAUTH_CLIENT_ID          OAuth 2.0 client id (required)
  OAUTH_CLIENT_SECRET      Client secret for confidential clients
  PUBLIC_BASE_URL          Origin of the frontend, e.g. https://promo.example.com
  REQUIRED_FOLLOW_ID       Only followers of this account may log in
  METRICS_BIND             Prometheus exporter address, e.g. 0.0.0.0:9090
  (See .env.example for all configuration options)
";

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
    memory_store: bool,
    seed_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        memory_store: pargs.contains("--memory-store"),
        seed_file: pargs.opt_value_from_str("--seed-file")?,
    };

    logging::init();

    let config = ServerConfig::from_env(
        args.bind,
        args.database_url,
        args.memory_store,
        args.seed_file,
    )?;
    config.validate()?;

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(|e| anyhow::anyhow!(e))?;
        info!("Prometheus exporter listening on {}", addr);
    }

    let store: Arc<dyn KvStore> = match &config.store {
        StoreConfig::Postgres(db_config) => {
            info!("Connecting to database");
            let db = Database::new(db_config)
                .await
                .context("Failed to connect to database")?;

            let store = PgKvStore::new(Arc::new(db.pool().clone())).with_op_timeout(config.kv_timeout);
            store.ensure_schema().await?;
            let purged = store.purge_expired().await?;
            info!("Database connected ({} expired entries purged)", purged);
            Arc::new(store)
        }
        StoreConfig::Memory => {
            warn!("Using in-memory store; sessions and claims are lost on restart");
            Arc::new(MemoryKvStore::new())
        }
    };

    let provider = HttpIdentityProvider::new(config.oauth.clone(), config.provider_timeout)?;

    let state = api::AppState::new(
        store,
        Arc::new(provider),
        config.oauth.clone(),
        config.web.clone(),
        config.required_follow_id.clone(),
    );

    if let Some(path) = &config.seed_file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        let report = state.allocator.pool().seed(parse_code_list(&text)).await?;
        info!(
            "Seeded {} codes from {} ({} skipped)",
            report.inserted,
            path.display(),
            report.skipped
        );
    }

    let available = state.allocator.pool().available_count().await?;
    metrics::codes_available(available);
    info!("{} codes available", available);

    if let Some(follow_id) = &config.required_follow_id {
        info!("Login restricted to followers of {}", follow_id);
    }

    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down server...");

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
}
