//! Recreate the ledger database with demo data.
//!
//! Deletes the configured database file, opens a fresh store (schema and
//! default catalog included) and inserts the demo sports and bets.

use anyhow::{Context, Result};
use tracing::info;

use quark_bets::config::AppConfig;
use quark_bets::engine::catalog::classify;
use quark_bets::storage::seed::seed_demo;
use quark_bets::storage::{BetRepository, SqliteStore};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();

    let cfg = AppConfig::load_or_default("config.toml")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("quark_bets=info")),
        )
        .init();

    let path = cfg.db_path();
    if path.exists() {
        std::fs::remove_file(&path)
            .with_context(|| format!("Failed to remove {}", path.display()))?;
        info!(path = %path.display(), "Removed existing database");
    }

    let store = SqliteStore::open(&path, 1, cfg.store_settings())
        .await
        .context("Failed to open bet store")?;
    let today = chrono::Local::now().date_naive();
    let written = seed_demo(&store, today).await?;

    let catalog = store.catalog().await?;
    println!("Seeded {written} bets into {}", path.display());
    for bet in store.list_bets().await? {
        let class = classify(bet.bet.as_deref().unwrap_or_default(), &catalog);
        let ev = bet
            .ev_perc
            .map(|p| format!("{p}%"))
            .unwrap_or_else(|| "-".into());
        println!("  {bet}  kind={} direction={} ev={ev}", class.kind, class.direction);
    }

    store.close().await;
    Ok(())
}
