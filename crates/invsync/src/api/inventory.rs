//! Inventory API endpoints

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::Value;
use tracing::info;

use invsync_api::{CommandResponse, CommandStatus, InventoryDump};

use crate::api::error::{ApiError, AppError};
use crate::state::AppState;

/// Configuration and per-domain state of the inventory module
#[utoipa::path(
    get,
    path = "/api/v1/inventory/dump",
    tag = "inventory",
    responses((status = 200, description = "Diagnostics snapshot", body = InventoryDump))
)]
pub async fn dump(State(state): State<Arc<AppState>>) -> Json<InventoryDump> {
    Json(state.inventory.dump())
}

/// Execute an administrative command
///
/// The request body holds the command parameters as a JSON object; an empty
/// body means no parameters.
///
/// # Errors
/// Returns `AppError` if the body is not valid JSON or the module is disabled
#[utoipa::path(
    post,
    path = "/api/v1/inventory/commands/{name}",
    tag = "inventory",
    params(("name" = String, Path, description = "Command name (`scan`, `reset`)")),
    request_body(content = Object, description = "Command parameters", content_type = "application/json"),
    responses(
        (status = 200, description = "Command finished", body = CommandResponse),
        (status = 202, description = "Command queued", body = CommandResponse),
        (status = 400, description = "Malformed parameters", body = ApiError),
        (status = 422, description = "Command failed", body = CommandResponse),
        (status = 503, description = "Inventory module disabled", body = ApiError)
    )
)]
pub async fn execute_command(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    if !state.inventory.is_enabled() {
        return Err(AppError::unavailable("inventory module is disabled"));
    }

    let parameters = parse_parameters(&body)?;
    info!(command = %name, "executing inventory command");

    let response = state.inventory.execute_command(&name, &parameters).await;
    let status = match response.status {
        CommandStatus::Success => StatusCode::OK,
        CommandStatus::InProgress => StatusCode::ACCEPTED,
        CommandStatus::Failure => StatusCode::UNPROCESSABLE_ENTITY,
    };

    Ok((status, Json(response)))
}

fn parse_parameters(body: &[u8]) -> Result<Value, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    match serde_json::from_slice(body) {
        Ok(value @ (Value::Object(_) | Value::Null)) => Ok(value),
        Ok(_) => Err(AppError::bad_request("parameters must be a JSON object")),
        Err(e) => Err(AppError::bad_request(format!("invalid JSON body: {e}"))),
    }
}
