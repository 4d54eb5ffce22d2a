//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::connection_manager::RegistryStats;
use crate::notification::FanoutStatsSnapshot;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub storage_backend: String,
    pub cluster: ClusterHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct ClusterHealthResponse {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub sessions: RegistryStats,
    pub notifications: FanoutStatsSnapshot,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        storage_backend: state.storage_backend.to_string(),
        cluster: ClusterHealthResponse {
            enabled: state.router.relay().is_some(),
            server_id: state.router.server_id().map(str::to_string),
        },
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        sessions: state.connection_manager.stats(),
        notifications: state.fanout.stats(),
    })
}
