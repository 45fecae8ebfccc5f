//! Session context: one run of the countdown from start to stop or expiry

use chrono::{DateTime, Utc};

use super::{PresentationState, Settings};

/// Owns the in-memory presentation state plus the settings it was started with.
///
/// Constructed on start (or when a persisted running state is restored) and
/// consumed by [`Session::finish`].
#[derive(Debug, Clone)]
pub struct Session {
    settings: Settings,
    state: PresentationState,
}

impl Session {
    /// Begin a new session with the full presentation time on the clock
    pub fn start(settings: Settings, now: DateTime<Utc>) -> Self {
        let state = PresentationState::started(settings.total_seconds(), now);
        Self { settings, state }
    }

    /// Rebuild a session from a persisted running state
    pub fn restore(settings: Settings, mut state: PresentationState) -> Self {
        state.current_slide = state.current_slide.clamp(1, settings.slide_count.max(1));
        Self { settings, state }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> &PresentationState {
        &self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused
    }

    pub fn time_remaining(&self) -> u64 {
        self.state.time_remaining
    }

    /// Recompute the counter from `start_time`, never raising it; returns the new value
    pub fn resync(&mut self, now: DateTime<Utc>) -> u64 {
        let remaining = self.state.remaining_at(self.settings.total_seconds(), now);
        self.state.time_remaining = remaining;
        self.state.timestamp = now;
        remaining
    }

    /// One-second decrement
    pub fn tick(&mut self, now: DateTime<Utc>) -> u64 {
        self.state.decrement(1, now)
    }

    /// Flip the paused flag; `start_time` is left alone
    pub fn toggle_pause(&mut self, now: DateTime<Utc>) -> bool {
        self.state.is_paused = !self.state.is_paused;
        self.state.timestamp = now;
        self.state.is_paused
    }

    /// Clear the paused flag, returning whether anything changed
    pub fn resume(&mut self, now: DateTime<Utc>) -> bool {
        if !self.state.is_paused {
            return false;
        }
        self.toggle_pause(now);
        true
    }

    pub fn next_slide(&mut self, now: DateTime<Utc>) -> bool {
        if self.state.current_slide >= self.settings.slide_count {
            return false;
        }
        self.state.current_slide += 1;
        self.state.timestamp = now;
        true
    }

    pub fn previous_slide(&mut self, now: DateTime<Utc>) -> bool {
        if self.state.current_slide <= 1 {
            return false;
        }
        self.state.current_slide -= 1;
        self.state.timestamp = now;
        true
    }

    /// Jump the clock to `seconds`. Only moves the counter down so the
    /// non-increasing invariant holds.
    pub fn set_time_remaining(&mut self, seconds: u64, now: DateTime<Utc>) -> bool {
        if seconds > self.settings.total_seconds() || seconds > self.state.time_remaining {
            return false;
        }
        self.state.time_remaining = seconds;
        self.state.timestamp = now;
        true
    }

    /// Tear the session down into its final, stopped state
    pub fn finish(mut self, now: DateTime<Utc>) -> PresentationState {
        self.state.mark_stopped(now);
        self.state
    }
}
