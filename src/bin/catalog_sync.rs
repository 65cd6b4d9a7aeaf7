//! Catalog Sync
//!
//! Reconciles the `services` table with the canonical definitions file and
//! regenerates the static fallback snapshot. Configured entirely through the
//! environment:
//!
//!   DATABASE_URL=postgres://... \
//!   CATALOG_CONFIG=config/catalog.yaml \
//!   CATALOG_FORCE_UPDATE=true \
//!   cargo run --features database --bin catalog_sync
//!
//! Exits non-zero on a fatal error or when any item failed.

use std::process::ExitCode;
use std::sync::Arc;

use service_catalog::{sync_catalog, CatalogConfig, LocalFs, PgCatalogStore};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,service_catalog=debug".into()),
        )
        .init();

    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("Catalog sync aborted: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<bool> {
    let config = CatalogConfig::from_env()?;
    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

    let store = Arc::new(PgCatalogStore::connect(&database_url).await?);
    let fs = Arc::new(LocalFs::new());

    let outcome = sync_catalog(&config, store, fs).await?;

    print!("{}", outcome.stats);
    for warning in &outcome.warnings {
        println!("  warning: {}", warning);
    }
    if let Some(snapshot) = &outcome.snapshot {
        println!(
            "Snapshot: {} ({} entries{})",
            snapshot.path.display(),
            snapshot.entries,
            if snapshot.unchanged { ", unchanged" } else { "" }
        );
    }

    Ok(outcome.is_success())
}
