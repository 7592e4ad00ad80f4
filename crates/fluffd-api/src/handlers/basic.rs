//! Basic handlers - health check and unknown routes.

use axum::{extract::State, Json};
use serde::Serialize;

use super::ServerState;
use crate::models::ErrorResponse;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub version: &'static str,
    pub uptime: u64,
    pub connected_devices: usize,
}

/// Health check with uptime and connection count.
pub async fn health_handler(State(state): State<ServerState>) -> Json<HealthStatus> {
    let uptime = chrono::Utc::now().timestamp() - state.started_at;
    let connected_devices = state.devices.connected_addresses().await.len();

    Json(HealthStatus {
        status: "healthy".to_string(),
        service: "fluffd".to_string(),
        version: env!("CARGO_PKG_VERSION"),
        uptime: uptime.max(0) as u64,
        connected_devices,
    })
}

pub async fn not_found_handler() -> ErrorResponse {
    ErrorResponse::not_found("Not Found")
}
