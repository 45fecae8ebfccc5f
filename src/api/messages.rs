//! Foreground/background message contract
//!
//! Requests are tagged by `action`; every request gets exactly one response.
//! Ordering across separate requests is not guaranteed.

use serde::{Deserialize, Serialize};

use crate::state::Settings;

/// Request sent to the background coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    /// Show `text` on the badge; an empty string clears it
    UpdateBadge { text: String },
    GetSettings,
    UpdateSettings { settings: Settings },
}

impl Message {
    /// Every `action` tag the coordinator answers
    pub const ACTIONS: [&'static str; 3] = ["updateBadge", "getSettings", "updateSettings"];

    pub fn is_known_action(action: &str) -> bool {
        Self::ACTIONS.contains(&action)
    }
}

/// Reply to a [`Message`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageResponse {
    Settings {
        settings: Settings,
    },
    Ack {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl MessageResponse {
    pub fn ok() -> Self {
        Self::Ack {
            success: true,
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Ack {
            success: false,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            Self::Settings { .. } => true,
            Self::Ack { success, .. } => *success,
        }
    }
}
