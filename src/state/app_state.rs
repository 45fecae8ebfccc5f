//! Shared daemon state handed to the HTTP layer

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::{
    services::{Badge, PRESENTATION_ALARM},
    store::{load_foreground_active, load_presentation_state, StateStore},
    tasks::BackgroundCoordinator,
};
use super::PresentationState;

/// Point-in-time view of the countdown as the daemon sees it
#[derive(Debug, Clone)]
pub struct CountdownSnapshot {
    pub presentation: Option<PresentationState>,
    pub badge: Option<Badge>,
    pub alarm_armed: bool,
    pub foreground_active: bool,
}

/// Application state shared by the HTTP handlers
pub struct AppState {
    /// Coordinator answering foreground messages
    pub coordinator: Arc<BackgroundCoordinator>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Mutex<Option<String>>,
    pub last_action_time: Mutex<Option<DateTime<Utc>>>,
}

impl AppState {
    pub fn new(coordinator: Arc<BackgroundCoordinator>, port: u16, host: String) -> Self {
        Self {
            coordinator,
            start_time: Instant::now(),
            port,
            host,
            last_action: Mutex::new(None),
            last_action_time: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &dyn StateStore {
        self.coordinator.store().as_ref()
    }

    /// Remember the most recent message action
    pub fn record_action(&self, action: &str) {
        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }
    }

    /// Read everything the status endpoint reports
    pub fn snapshot(&self) -> Result<CountdownSnapshot, String> {
        let presentation = match load_presentation_state(self.store()) {
            Ok(state) => state,
            Err(crate::error::TimerError::StateCorruption { key, reason }) => {
                warn!("Status ignores corrupt '{}': {}", key, reason);
                None
            }
            Err(e) => return Err(format!("Failed to read presentation state: {}", e)),
        };
        let foreground_active = load_foreground_active(self.store())
            .map_err(|e| format!("Failed to read foreground flag: {}", e))?;

        Ok(CountdownSnapshot {
            presentation,
            badge: self.coordinator.indicator().current(),
            alarm_armed: self.coordinator.scheduler().is_armed(PRESENTATION_ALARM),
            foreground_active,
        })
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }
}
