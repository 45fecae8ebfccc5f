//! HTTP API module
//!
//! This module exposes the message contract between the foreground and the
//! background coordinator, plus status and health endpoints.

pub mod handlers;
pub mod messages;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/message", post(message_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
