//! Command catalog and execution.

use axum::{
    body::Bytes,
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};

use super::ServerState;
use crate::models::{ApiResult, CommandRequest, CommandResponse, ErrorResponse};

/// The full command catalog.
///
/// GET /list
pub async fn list_commands_handler(State(state): State<ServerState>) -> Response {
    Json(state.commands.as_ref()).into_response()
}

/// Run a command on one device or broadcast it.
///
/// POST /cmd/*command
///
/// Body: `{"params": {...}, "target": "<address>"}`; both fields are optional.
pub async fn command_handler(
    State(state): State<ServerState>,
    Path(command): Path<String>,
    body: Bytes,
) -> ApiResult<Json<CommandResponse>> {
    let request: CommandRequest = serde_json::from_slice(&body)
        .map_err(|_| ErrorResponse::bad_request("Bad Request: Invalid JSON."))?;
    let target = request.target().map(str::to_string);

    tracing::info!(
        command = %command,
        target = target.as_deref().unwrap_or("broadcast"),
        "Command request"
    );

    let router = state.router.clone();
    let name = command.clone();
    let outcome = state
        .run_device_op("Command", state.timeouts.command(), async move {
            router
                .dispatch(&name, &request.params, target.as_deref())
                .await
        })
        .await
        .map_err(|e| e.context("Command timed out or failed"))??;

    Ok(Json(CommandResponse {
        status: "ok",
        details: outcome.details(),
    }))
}
