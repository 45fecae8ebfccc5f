//! Presentation state structure and elapsed-time math

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Running countdown as persisted under `presentationState`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationState {
    pub is_running: bool,
    /// Only meaningful while `is_running`
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default = "first_slide")]
    pub current_slide: u32,
    /// Remaining seconds, authoritative
    #[serde(default)]
    pub time_remaining: u64,
    /// Instant the current running segment began
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    /// Instant of the last write
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

fn first_slide() -> u32 {
    1
}

impl PresentationState {
    /// Create a stopped state with nothing left on the clock
    pub fn idle(now: DateTime<Utc>) -> Self {
        Self {
            is_running: false,
            is_paused: false,
            current_slide: 1,
            time_remaining: 0,
            start_time: None,
            timestamp: now,
        }
    }

    /// Create the state of a freshly started session
    pub fn started(total_seconds: u64, now: DateTime<Utc>) -> Self {
        Self {
            is_running: true,
            is_paused: false,
            current_slide: 1,
            time_remaining: total_seconds,
            start_time: Some(now),
            timestamp: now,
        }
    }

    /// Running and not paused, i.e. time is expected to fall
    pub fn is_counting(&self) -> bool {
        self.is_running && !self.is_paused
    }

    /// Whether a wake-up or tick has anything left to do
    pub fn has_time_left(&self) -> bool {
        self.is_counting() && self.time_remaining > 0
    }

    /// Remove `seconds` from the clock without going below zero
    pub fn decrement(&mut self, seconds: u64, now: DateTime<Utc>) -> u64 {
        self.time_remaining = self.time_remaining.saturating_sub(seconds);
        self.timestamp = now;
        self.time_remaining
    }

    /// Clear both running flags, keeping the last counter for diagnostics
    pub fn mark_stopped(&mut self, now: DateTime<Utc>) {
        self.is_running = false;
        self.is_paused = false;
        self.timestamp = now;
    }

    /// Remaining seconds as of `now`.
    ///
    /// While counting, the elapsed time since `start_time` caps the stored
    /// counter; it never raises it. A paused or unanchored state keeps its
    /// stored value.
    pub fn remaining_at(&self, total_seconds: u64, now: DateTime<Utc>) -> u64 {
        match self.start_time {
            Some(start) if self.is_counting() => {
                remaining_from_start(total_seconds, start, now).min(self.time_remaining)
            }
            _ => self.time_remaining,
        }
    }
}

/// `max(0, total - floor((now - start) / 1s))`
pub fn remaining_from_start(total_seconds: u64, start: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    // A clock that went backwards counts as no elapsed time
    let elapsed_ms = (now - start).num_milliseconds().max(0) as u64;
    total_seconds.saturating_sub(elapsed_ms / 1000)
}
