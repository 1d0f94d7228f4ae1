//! HTTP server for sync status endpoints
//!
//! Provides /health, /sources, and POST /market-signal for feeding the
//! reference-index volume used by the market-signal non-trading-day rule.

use crate::types::{HealthResponse, MarketSignalReading};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use market_calendar::VolumeLedger;
use snapshot_cache::{SnapshotSyncer, SourceStatus};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Shared state for the HTTP server
pub struct ServerState {
    pub syncer: Arc<SnapshotSyncer>,
    pub volume_ledger: Arc<VolumeLedger>,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(syncer: Arc<SnapshotSyncer>, volume_ledger: Arc<VolumeLedger>) -> Self {
        Self {
            syncer,
            volume_ledger,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sources", get(sources))
        .route("/market-signal", post(record_market_signal))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        sources: state.syncer.catalog().len(),
        sync: state.syncer.stats(),
    })
}

/// Per-source freshness
async fn sources(State(state): State<SharedState>) -> Json<Vec<SourceStatus>> {
    Json(state.syncer.source_status().await)
}

/// Record the reference index's traded volume for one exchange-local date
async fn record_market_signal(
    State(state): State<SharedState>,
    Json(reading): Json<MarketSignalReading>,
) -> StatusCode {
    info!(date = %reading.date, volume = reading.volume, "Market signal recorded");
    state.volume_ledger.record(reading.date, reading.volume);
    StatusCode::NO_CONTENT
}
