//! QUARK BETS — sports wager ledger
//!
//! Entry point. Loads configuration, initialises structured logging,
//! opens the SQLite ledger and serves the HTTP API until Ctrl+C.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use quark_bets::api::{self, ApiState};
use quark_bets::config::AppConfig;
use quark_bets::storage::{BetRepository, SqliteStore};

const BANNER: &str = r#"
  ___                   _      ____       _
 / _ \ _   _  __ _ _ __| | __ | __ )  ___| |_ ___
| | | | | | |/ _` | '__| |/ / |  _ \ / _ \ __/ __|
| |_| | |_| | (_| | |  |   <  | |_) |  __/ |_\__ \
 \__\_\\__,_|\__,_|_|  |_|\_\ |____/ \___|\__|___/

  Wager ledger, settlement and EV analytics
  v0.1.0
"#;

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = AppConfig::load_or_default(CONFIG_PATH)?;

    init_logging(&cfg);

    println!("{BANNER}");
    info!(
        addr = %cfg.bind_addr(),
        db = %cfg.db_path().display(),
        default_commission = %cfg.ledger.default_commission,
        allow_resettle = cfg.ledger.allow_resettle,
        "QUARK BETS starting up"
    );
    if !std::path::Path::new(CONFIG_PATH).exists() {
        warn!(path = CONFIG_PATH, "No config file found, using defaults");
    }

    let store = SqliteStore::open(
        &cfg.db_path(),
        cfg.storage.max_connections,
        cfg.store_settings(),
    )
    .await
    .context("Failed to open bet store")?;

    let bets = store.list_bets().await?.len();
    let types = store.list_bet_types().await?.len();
    info!(bets, bet_types = types, "Ledger loaded");

    let state = Arc::new(ApiState::new(
        Arc::new(store.clone()),
        cfg.ledger.default_commission,
    ));
    let app = api::build_router(state, api::cors_layer(&cfg.server.cors_origin)?);

    api::serve(app, &cfg.bind_addr(), shutdown_signal()).await?;

    store.close().await;
    info!("QUARK BETS shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Initialise the tracing subscriber.
///
/// `RUST_LOG` wins over the configured filter. JSON output when
/// `QUARK_LOG_JSON` is set or `logging.json = true`.
fn init_logging(cfg: &AppConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_filter = cfg.logging.filter.as_deref().unwrap_or("quark_bets=info");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let json_logging = cfg.logging.json || std::env::var("QUARK_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
