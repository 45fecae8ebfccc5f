//! API response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{services::Badge, state::PresentationState};

/// Status response with countdown and coordinator information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub presentation: Option<PresentationState>,
    pub badge: Option<Badge>,
    pub alarm_armed: bool,
    pub foreground_active: bool,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
