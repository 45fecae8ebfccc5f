//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::state::AppState;
use super::{
    messages::{Message, MessageResponse},
    responses::{HealthResponse, StatusResponse},
};

/// Handle POST /message - Foreground request to the background coordinator
pub async fn message_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Json<MessageResponse> {
    let action = body
        .get("action")
        .and_then(Value::as_str)
        .unwrap_or("<none>")
        .to_string();

    let message = match serde_json::from_value::<Message>(body) {
        Ok(message) => message,
        Err(e) => {
            warn!("Rejected message with action '{}': {}", action, e);
            let reason = if Message::is_known_action(&action) {
                format!("invalid '{}' message: {}", action, e)
            } else {
                format!("unknown action '{}'", action)
            };
            return Json(MessageResponse::failure(reason));
        }
    };

    debug!("Message received: {:?}", message);
    state.record_action(&action);
    Json(state.coordinator.handle_message(message).await)
}

/// Handle GET /status - Return the countdown as the daemon sees it
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, StatusCode> {
    let snapshot = match state.snapshot() {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to build status: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let (last_action, last_action_time) = state.get_last_action();

    Ok(Json(StatusResponse {
        presentation: snapshot.presentation,
        badge: snapshot.badge,
        alarm_armed: snapshot.alarm_armed,
        foreground_active: snapshot.foreground_active,
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    }))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
