//! Presentation settings and their validation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TimerError;

pub const DEFAULT_SLIDE_COUNT: u32 = 10;
pub const DEFAULT_PRESENTATION_MINUTES: u32 = 5;

/// Settings persisted under `presentationSettings`, independent of the running state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub slide_count: u32,
    /// Minutes
    pub presentation_time: u32,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Settings {
    /// Validate raw form input; both values must be positive
    pub fn validated(
        slide_count: i64,
        presentation_time: i64,
        now: DateTime<Utc>,
    ) -> Result<Self, TimerError> {
        if slide_count <= 0 || presentation_time <= 0 {
            return Err(TimerError::Validation(
                "slide count and presentation time must both be greater than zero".to_string(),
            ));
        }

        let slide_count = u32::try_from(slide_count)
            .map_err(|_| TimerError::Validation(format!("slide count {} is too large", slide_count)))?;
        let presentation_time = u32::try_from(presentation_time).map_err(|_| {
            TimerError::Validation(format!("presentation time {} is too large", presentation_time))
        })?;

        Ok(Self {
            slide_count,
            presentation_time,
            timestamp: now,
        })
    }

    /// Check values that arrived already typed, e.g. over the message API
    pub fn validate(&self) -> Result<(), TimerError> {
        Self::validated(
            i64::from(self.slide_count),
            i64::from(self.presentation_time),
            self.timestamp,
        )
        .map(|_| ())
    }

    /// Full presentation length in seconds
    pub fn total_seconds(&self) -> u64 {
        u64::from(self.presentation_time) * 60
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            slide_count: DEFAULT_SLIDE_COUNT,
            presentation_time: DEFAULT_PRESENTATION_MINUTES,
            timestamp: Utc::now(),
        }
    }
}
