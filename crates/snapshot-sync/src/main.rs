//! Snapshot sync service
//!
//! Keeps a catalog of remote market data snapshots cached on local disk,
//! refreshing each one according to its schedule and the trading calendar.

mod error;
mod server;
mod types;

use crate::error::{Result, SnapshotSyncError};
use crate::server::{start_server, ServerState, SharedState};
use crate::types::SnapshotSyncConfig;
use market_calendar::VolumeLedger;
use snapshot_cache::{CacheRegistry, SnapshotSyncer, SourceCatalog, SyncDriver};
use snapshot_fetcher::HttpBlobFetcher;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("snapshot_sync=info".parse()?)
        .add_directive("snapshot_cache=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting snapshot sync service...");

    let config = SnapshotSyncConfig::from_env()?;
    info!("Port: {}", config.port);
    info!("Catalog: {:?}", config.catalog_path);
    info!("Data root: {:?}", config.data_root);
    info!("Registry: {:?}", config.registry_path);
    info!(
        "Market: {} {}-{} ({} rule)",
        config.timezone, config.session.open, config.session.close, config.non_trading_day_rule
    );

    // Fed through POST /market-signal; without a reading for a day the weekend rule applies
    let volume_ledger = Arc::new(VolumeLedger::new());
    let calendar = config.build_calendar(volume_ledger.clone())?;

    let catalog = SourceCatalog::load(&config.catalog_path, &config.data_root).await?;

    let fetcher = HttpBlobFetcher::new(&config.blob_base_url, config.fetch_timeout)?;
    let registry = CacheRegistry::open(&config.registry_path);

    let syncer = Arc::new(
        SnapshotSyncer::new(catalog, registry, Arc::new(fetcher), calendar)
            .with_fetch_timeout(config.fetch_timeout)
            .with_retry_backoff(config.poll_interval),
    );

    // Periodic refresh runs alongside the HTTP server
    let driver = SyncDriver::new(syncer.clone(), config.poll_interval);
    tokio::spawn(driver.run());

    let state: SharedState = Arc::new(ServerState::new(syncer, volume_ledger));

    // Start HTTP server (blocking)
    start_server(state, config.port)
        .await
        .map_err(|e| SnapshotSyncError::Config(format!("Server error: {}", e)))?;

    Ok(())
}
