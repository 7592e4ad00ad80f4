//! Scan, connect and disconnect.

use axum::{
    extract::{Path, State},
    Json,
};
use fluffd_devices::ConnectOutcome;

use super::ServerState;
use crate::models::{ApiResult, DeviceListResponse, ErrorResponse, ScanResponse, StatusMessage};

/// Scan for nearby Furbys.
///
/// GET /scan
pub async fn scan_handler(State(state): State<ServerState>) -> ApiResult<Json<ScanResponse>> {
    let devices = state.devices.clone();
    let window = state.timeouts.scan_window();

    let found = state
        .run_device_op("Scan", state.timeouts.scan(), async move {
            devices.scan(window).await
        })
        .await
        .map_err(|e| e.context("Scan failed or timed out"))?
        .map_err(|e| ErrorResponse::internal(format!("Scan failed or timed out: {}", e)))?;

    tracing::info!(count = found.len(), "Scan completed");
    Ok(Json(ScanResponse {
        status: "ok",
        message: "Scanning completed.".to_string(),
        devices: found.into_iter().map(|d| d.address).collect(),
    }))
}

/// Connect to a Furby by address.
///
/// GET /connect/:address
pub async fn connect_handler(
    State(state): State<ServerState>,
    Path(address): Path<String>,
) -> ApiResult<Json<StatusMessage>> {
    let devices = state.devices.clone();
    let target = address.clone();

    let outcome = state
        .run_device_op("Connect", state.timeouts.connect(), async move {
            devices.connect_device(&target).await
        })
        .await
        .map_err(|e| e.context(&format!("Failed to connect to {}", address)))?;

    match outcome {
        Ok(ConnectOutcome::AlreadyConnected) => {
            Ok(Json(StatusMessage::ok(format!("Already connected to {}", address))))
        }
        Ok(ConnectOutcome::Connected) => Ok(Json(StatusMessage::ok(format!(
            "Successfully connected to {}",
            address
        )))),
        Err(e) => {
            tracing::warn!(address = %address, error = %e, "Connect failed");
            Err(ErrorResponse::internal(format!(
                "Failed to connect to {}",
                address
            )))
        }
    }
}

/// Disconnect a connected Furby.
///
/// GET /disconnect/:address
pub async fn disconnect_handler(
    State(state): State<ServerState>,
    Path(address): Path<String>,
) -> ApiResult<Json<StatusMessage>> {
    let devices = state.devices.clone();
    let target = address.clone();

    let result = state
        .run_device_op("Disconnect", state.timeouts.disconnect(), async move {
            devices.disconnect_device(&target).await
        })
        .await
        .map_err(|e| e.context("Disconnection failed"))?;

    match result {
        Ok(()) => Ok(Json(StatusMessage::ok(format!("Disconnected from {}", address)))),
        Err(e) if e.is_not_found() => Err(ErrorResponse::not_found(format!(
            "Furby not found for disconnection: {}",
            address
        ))),
        Err(e) => Err(ErrorResponse::internal(format!(
            "Disconnection failed: {}",
            e
        ))),
    }
}

/// `/connect/` or `/disconnect/` without an address.
pub async fn missing_address_handler() -> ErrorResponse {
    ErrorResponse::bad_request("Device address missing")
}

/// Connected devices with their idle state.
///
/// GET /devices
pub async fn list_connected_handler(
    State(state): State<ServerState>,
) -> Json<DeviceListResponse> {
    Json(DeviceListResponse {
        status: "ok",
        devices: state.devices.summaries().await,
    })
}
