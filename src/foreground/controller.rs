//! Foreground controller state machine
//!
//! Drives the countdown while the console is open. It owns a one-second tick
//! loop only while visible and resynchronizes from `startTime` every time it
//! becomes visible again, since any amount of real time may have passed unseen.

use std::{sync::Arc, time::Duration};
use serde::Serialize;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::{
    error::TimerError,
    services::{IndicatorHandle, WakeScheduler, PRESENTATION_ALARM},
    state::{PresentationState, Session, Settings},
    store::{
        clear_session_data, load_presentation_state, load_settings_or_default,
        save_presentation_state, save_settings, set_foreground_active, StateStore,
    },
    utils::{format_mm_ss, Clock},
};

const TICK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ForegroundPhase {
    NoSession,
    SettingsForm,
    Running,
    Paused,
    Expired,
}

/// Result of one local tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Hidden, paused or no session
    Idle,
    Ticked(u64),
    /// Reached zero and stopped
    Expired,
}

/// Read-only snapshot for the surface to display
#[derive(Debug, Clone, Serialize)]
pub struct ForegroundView {
    pub phase: ForegroundPhase,
    pub time_remaining: u64,
    pub remaining_display: String,
    pub current_slide: u32,
    pub slide_count: u32,
    pub presentation_time: u32,
    pub remaining_slides: u32,
    pub time_progress: f64,
    pub slide_progress: f64,
    pub status: String,
}

pub struct ForegroundController {
    store: Arc<dyn StateStore>,
    indicator: IndicatorHandle,
    clock: Arc<dyn Clock>,
    scheduler: Option<WakeScheduler>,
    phase: ForegroundPhase,
    settings: Settings,
    session: Option<Session>,
    visible: bool,
    ticker: Option<Interval>,
    pending_write: bool,
    status: String,
}

impl ForegroundController {
    pub fn new(store: Arc<dyn StateStore>, indicator: IndicatorHandle, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            indicator,
            clock,
            scheduler: None,
            phase: ForegroundPhase::NoSession,
            settings: Settings::default(),
            session: None,
            visible: false,
            ticker: None,
            pending_write: false,
            status: String::new(),
        }
    }

    /// Disarm the background alarm directly when a session ends, instead of
    /// waiting for the coordinator to see the store change
    pub fn with_scheduler(mut self, scheduler: WakeScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn phase(&self) -> ForegroundPhase {
        self.phase
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether the local tick loop is armed
    pub fn is_ticking(&self) -> bool {
        self.ticker.is_some()
    }

    /// A state write failed and has not been retried successfully yet
    pub fn has_pending_write(&self) -> bool {
        self.pending_write
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Open the surface: take decrement authority and reconcile with the store
    pub async fn initialize(&mut self) -> ForegroundPhase {
        info!("Foreground opened");
        self.visible = true;
        self.mark_active(true);
        self.settings = load_settings_or_default(self.store.as_ref());

        let persisted = match load_presentation_state(self.store.as_ref()) {
            Ok(state) => state,
            Err(e) => {
                warn!("Not restoring presentation state: {}", e);
                None
            }
        };

        match persisted {
            Some(state) if state.is_running => self.restore(state).await,
            _ => {
                self.ticker = None;
                self.session = None;
                self.phase = ForegroundPhase::SettingsForm;
                self.status.clear();
            }
        }
        self.phase
    }

    /// Become visible again after [`hide`](Self::hide); same resync as opening
    pub async fn show(&mut self) -> ForegroundPhase {
        self.initialize().await
    }

    async fn restore(&mut self, state: PresentationState) {
        let now = self.clock.now();
        let stored = state.time_remaining;
        let mut session = Session::restore(self.settings.clone(), state);
        let remaining = session.resync(now);
        info!("Restored session: stored {}s, recomputed {}s", stored, remaining);

        let paused = session.is_paused();
        self.session = Some(session);

        if remaining == 0 {
            self.expire().await;
            return;
        }

        self.persist();
        self.phase = if paused { ForegroundPhase::Paused } else { ForegroundPhase::Running };
        self.status = if paused { "Paused" } else { "Presentation in progress" }.to_string();
        self.set_ticking(!paused);
        self.refresh_indicator().await;
    }

    /// Hide the surface: hand decrement authority back to the background
    pub fn hide(&mut self) {
        if !self.visible {
            return;
        }
        info!("Foreground hidden");
        self.visible = false;
        self.ticker = None;
        // Latest value first, so the background continues from it
        self.persist();
        self.mark_active(false);
    }

    /// Hide for good
    pub fn close(mut self) {
        self.hide();
    }

    /// Start a new session, replacing any running one
    pub async fn start(&mut self, slide_count: i64, presentation_time: i64) -> Result<(), TimerError> {
        let now = self.clock.now();
        let settings = match Settings::validated(slide_count, presentation_time, now) {
            Ok(settings) => settings,
            Err(e) => {
                self.status = "Enter a slide count and a presentation time".to_string();
                return Err(e);
            }
        };

        if self.session.is_some() {
            info!("Replacing the running session");
        }
        if let Err(e) = save_settings(self.store.as_ref(), &settings) {
            error!("Failed to save settings: {}", e);
        }

        info!(
            "Starting presentation: {} slides, {} min",
            settings.slide_count, settings.presentation_time
        );
        self.settings = settings.clone();
        self.session = Some(Session::start(settings, now));
        self.persist();
        self.phase = ForegroundPhase::Running;
        self.status = "Presentation started".to_string();
        self.set_ticking(true);
        self.refresh_indicator().await;
        Ok(())
    }

    /// One local second
    pub async fn tick(&mut self) -> TickOutcome {
        if !self.visible {
            return TickOutcome::Idle;
        }
        let now = self.clock.now();
        let remaining = match self.session.as_mut() {
            Some(session) if !session.is_paused() => session.tick(now),
            _ => return TickOutcome::Idle,
        };

        if remaining == 0 {
            self.expire().await;
            return TickOutcome::Expired;
        }

        debug!("Tick: {}s left", remaining);
        self.persist();
        self.refresh_indicator().await;
        TickOutcome::Ticked(remaining)
    }

    async fn expire(&mut self) {
        info!("Presentation time is up");
        self.stop().await;
        self.phase = ForegroundPhase::Expired;
        self.status = "Presentation time is up!".to_string();
    }

    /// Toggle pause. Returns the new paused flag, or `None` without a session.
    pub async fn pause(&mut self) -> Option<bool> {
        let now = self.clock.now();
        let paused = self.session.as_mut()?.toggle_pause(now);
        self.pause_changed(paused).await;
        Some(paused)
    }

    /// Clear the paused flag; returns whether the session was paused
    pub async fn resume(&mut self) -> bool {
        let now = self.clock.now();
        let resumed = self.session.as_mut().is_some_and(|session| session.resume(now));
        if resumed {
            self.pause_changed(false).await;
        }
        resumed
    }

    async fn pause_changed(&mut self, paused: bool) {
        info!("Presentation {}", if paused { "paused" } else { "resumed" });
        self.persist();
        self.phase = if paused { ForegroundPhase::Paused } else { ForegroundPhase::Running };
        self.status = if paused { "Paused" } else { "Resumed" }.to_string();
        self.set_ticking(!paused);
        self.refresh_indicator().await;
    }

    /// End the session
    pub async fn stop(&mut self) {
        self.ticker = None;
        let now = self.clock.now();
        let state = match self.session.take() {
            Some(session) => session.finish(now),
            None => PresentationState::idle(now),
        };
        info!("Presentation stopped with {}s left", state.time_remaining);

        self.write_state(&state);
        self.disarm_background();
        self.indicator.show_state(None).await;
        self.phase = ForegroundPhase::SettingsForm;
        self.status = "Presentation stopped".to_string();
    }

    /// Forget both settings and running state
    pub async fn reset_settings(&mut self) {
        self.ticker = None;
        self.session = None;
        self.settings = Settings::default();
        if let Err(e) = clear_session_data(self.store.as_ref()) {
            error!("Failed to clear stored settings: {}", e);
        }
        self.disarm_background();
        self.indicator.show_state(None).await;
        self.phase = ForegroundPhase::SettingsForm;
        self.status = "Settings reset".to_string();
    }

    /// Persist form edits made while no session is running
    pub fn update_settings_draft(&mut self, slide_count: i64, presentation_time: i64) -> Result<(), TimerError> {
        if self.session.is_some() {
            return Err(TimerError::Validation(
                "settings cannot change while a presentation is running".to_string(),
            ));
        }
        let settings = Settings::validated(slide_count, presentation_time, self.clock.now())?;
        save_settings(self.store.as_ref(), &settings)?;
        self.settings = settings;
        Ok(())
    }

    pub fn next_slide(&mut self) -> bool {
        let now = self.clock.now();
        let moved = self.session.as_mut().is_some_and(|session| session.next_slide(now));
        if moved {
            self.persist();
        }
        moved
    }

    pub fn previous_slide(&mut self) -> bool {
        let now = self.clock.now();
        let moved = self.session.as_mut().is_some_and(|session| session.previous_slide(now));
        if moved {
            self.persist();
        }
        moved
    }

    /// Jump the clock down to `seconds`
    pub async fn set_current_time(&mut self, seconds: u64) -> bool {
        let now = self.clock.now();
        let changed = self
            .session
            .as_mut()
            .is_some_and(|session| session.set_time_remaining(seconds, now));
        if !changed {
            return false;
        }
        if seconds == 0 {
            self.expire().await;
            return true;
        }
        self.status = format!("Time set to {}", format_mm_ss(seconds));
        self.persist();
        self.refresh_indicator().await;
        true
    }

    /// Wait for the next local tick; never resolves while the loop is disarmed
    pub async fn wait_tick(&mut self) {
        match self.ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    pub fn view(&self) -> ForegroundView {
        let settings = self.session.as_ref().map_or(&self.settings, Session::settings);
        let (time_remaining, current_slide) = match &self.session {
            Some(session) => (session.time_remaining(), session.state().current_slide),
            None => (0, 1),
        };

        let total = settings.total_seconds().max(1) as f64;
        let elapsed = settings.total_seconds().saturating_sub(time_remaining) as f64;
        let slide_count = settings.slide_count.max(1);

        ForegroundView {
            phase: self.phase,
            time_remaining,
            remaining_display: format_mm_ss(time_remaining),
            current_slide,
            slide_count: settings.slide_count,
            presentation_time: settings.presentation_time,
            remaining_slides: settings.slide_count.saturating_sub(current_slide),
            time_progress: (elapsed / total * 100.0).min(100.0),
            slide_progress: (f64::from(current_slide.saturating_sub(1)) / f64::from(slide_count) * 100.0).min(100.0),
            status: self.status.clone(),
        }
    }

    fn set_ticking(&mut self, on: bool) {
        if on && self.visible {
            if self.ticker.is_none() {
                let mut ticker = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.ticker = Some(ticker);
            }
        } else {
            self.ticker = None;
        }
    }

    fn disarm_background(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.disarm(PRESENTATION_ALARM);
        }
    }

    fn mark_active(&self, active: bool) {
        if let Err(e) = set_foreground_active(self.store.as_ref(), active) {
            error!("Failed to set foreground flag to {}: {}", active, e);
        }
    }

    fn persist(&mut self) {
        if let Some(state) = self.session.as_ref().map(|session| session.state().clone()) {
            self.write_state(&state);
        }
    }

    /// Every mutation writes the full state, so a failed write is retried by
    /// the next one
    fn write_state(&mut self, state: &PresentationState) {
        match save_presentation_state(self.store.as_ref(), state) {
            Ok(()) => {
                if self.pending_write {
                    info!("Pending presentation state write recovered");
                }
                self.pending_write = false;
            }
            Err(e) => {
                error!("Failed to persist presentation state: {}", e);
                self.pending_write = true;
            }
        }
    }

    async fn refresh_indicator(&self) {
        self.indicator
            .show_state(self.session.as_ref().map(Session::state))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        services::{Badge, RUNNING_COLOR},
        store::{load_foreground_active, MemoryStore},
        testing::{FlakyStore, ManualClock, RecordingSink},
    };

    struct Fixture {
        store: Arc<dyn StateStore>,
        sink: RecordingSink,
        clock: ManualClock,
        controller: ForegroundController,
    }

    fn fixture_with(store: Arc<dyn StateStore>) -> Fixture {
        let sink = RecordingSink::new();
        let clock = ManualClock::at_nine();
        let controller = ForegroundController::new(
            Arc::clone(&store),
            IndicatorHandle::spawn(sink.clone()),
            Arc::new(clock.clone()),
        );
        Fixture { store, sink, clock, controller }
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(MemoryStore::new()))
    }

    fn stored(fx: &Fixture) -> PresentationState {
        load_presentation_state(fx.store.as_ref()).unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_initialize_without_session_shows_settings_form() {
        let mut fx = fixture();
        assert_eq!(fx.controller.initialize().await, ForegroundPhase::SettingsForm);
        assert!(load_foreground_active(fx.store.as_ref()).unwrap());
        assert!(!fx.controller.is_ticking());
    }

    #[tokio::test]
    async fn test_start_sets_full_time_and_persists() {
        let mut fx = fixture();
        fx.controller.initialize().await;
        fx.controller.start(10, 5).await.unwrap();

        let state = stored(&fx);
        assert!(state.is_running);
        assert_eq!(state.time_remaining, 300);
        assert_eq!(state.current_slide, 1);
        assert_eq!(state.start_time, Some(fx.clock.now()));
        assert!(fx.controller.is_ticking());
        assert_eq!(fx.sink.last(), Some(Some(Badge::new("5", RUNNING_COLOR))));
    }

    #[tokio::test]
    async fn test_invalid_start_writes_nothing() {
        let mut fx = fixture();
        fx.controller.initialize().await;
        let result = fx.controller.start(0, 5).await;

        assert!(matches!(result, Err(TimerError::Validation(_))));
        assert_eq!(load_presentation_state(fx.store.as_ref()).unwrap(), None);
        assert_eq!(fx.controller.phase(), ForegroundPhase::SettingsForm);
    }

    #[tokio::test]
    async fn test_tick_decrements_and_updates_badge() {
        let mut fx = fixture();
        fx.controller.initialize().await;
        fx.controller.start(10, 1).await.unwrap();

        assert_eq!(fx.controller.tick().await, TickOutcome::Ticked(59));
        assert_eq!(stored(&fx).time_remaining, 59);
        assert_eq!(fx.sink.last(), Some(Some(Badge::new("0", RUNNING_COLOR))));
    }

    #[tokio::test]
    async fn test_tick_to_zero_expires() {
        let mut fx = fixture();
        fx.controller.initialize().await;
        fx.controller.start(10, 1).await.unwrap();
        for _ in 0..59 {
            fx.controller.tick().await;
        }

        assert_eq!(fx.controller.tick().await, TickOutcome::Expired);
        assert_eq!(fx.controller.phase(), ForegroundPhase::Expired);
        assert!(!fx.controller.is_ticking());
        let state = stored(&fx);
        assert!(!state.is_running);
        assert_eq!(state.time_remaining, 0);
        assert_eq!(fx.sink.last(), Some(None));
    }

    #[tokio::test]
    async fn test_pause_twice_equals_pause_then_resume() {
        let mut fx = fixture();
        fx.controller.initialize().await;
        fx.controller.start(10, 5).await.unwrap();

        assert_eq!(fx.controller.pause().await, Some(true));
        assert!(!fx.controller.is_ticking());
        assert_eq!(fx.controller.tick().await, TickOutcome::Idle);
        assert_eq!(fx.controller.pause().await, Some(false));
        assert!(!stored(&fx).is_paused);

        assert_eq!(fx.controller.pause().await, Some(true));
        assert!(fx.controller.resume().await);
        assert!(!stored(&fx).is_paused);
        assert_eq!(stored(&fx).start_time, Some(fx.clock.now()));
    }

    #[tokio::test]
    async fn test_stop_clears_everything() {
        let mut fx = fixture();
        fx.controller.initialize().await;
        fx.controller.start(10, 5).await.unwrap();
        fx.controller.pause().await;
        fx.controller.stop().await;

        let state = stored(&fx);
        assert!(!state.is_running);
        assert!(!state.is_paused);
        assert!(!fx.controller.is_ticking());
        assert!(fx.controller.session().is_none());
        assert_eq!(fx.controller.phase(), ForegroundPhase::SettingsForm);
        assert_eq!(fx.sink.last(), Some(None));
    }

    #[tokio::test]
    async fn test_stop_disarms_background_alarm() {
        let (scheduler, _events) = WakeScheduler::new();
        let mut fx = fixture();
        fx.controller = ForegroundController::new(
            Arc::clone(&fx.store),
            IndicatorHandle::spawn(fx.sink.clone()),
            Arc::new(fx.clock.clone()),
        )
        .with_scheduler(scheduler.clone());
        fx.controller.initialize().await;
        fx.controller.start(10, 5).await.unwrap();
        scheduler.arm(PRESENTATION_ALARM, 1);

        fx.controller.stop().await;
        assert!(!scheduler.is_armed(PRESENTATION_ALARM));
    }

    #[tokio::test]
    async fn test_reopen_recomputes_from_start_time() {
        let mut fx = fixture();
        fx.controller.initialize().await;
        fx.controller.start(10, 5).await.unwrap();
        fx.controller.hide();
        assert!(!load_foreground_active(fx.store.as_ref()).unwrap());

        fx.clock.advance(chrono::Duration::milliseconds(125_700));
        assert_eq!(fx.controller.show().await, ForegroundPhase::Running);
        assert_eq!(fx.controller.session().unwrap().time_remaining(), 175);
        assert_eq!(stored(&fx).time_remaining, 175);
        assert!(fx.controller.is_ticking());
    }

    #[tokio::test]
    async fn test_reopen_does_not_undo_set_current_time() {
        let mut fx = fixture();
        fx.controller.initialize().await;
        fx.controller.start(10, 5).await.unwrap();
        assert!(fx.controller.set_current_time(100).await);
        fx.controller.hide();

        fx.clock.advance_secs(1);
        assert_eq!(fx.controller.show().await, ForegroundPhase::Running);
        assert_eq!(fx.controller.session().unwrap().time_remaining(), 100);
        assert_eq!(stored(&fx).time_remaining, 100);
    }

    #[tokio::test]
    async fn test_reopen_after_deadline_expires() {
        let mut fx = fixture();
        fx.controller.initialize().await;
        fx.controller.start(10, 5).await.unwrap();
        fx.controller.hide();

        fx.clock.advance_secs(3_600);
        assert_eq!(fx.controller.show().await, ForegroundPhase::Expired);
        assert!(!stored(&fx).is_running);
        assert_eq!(stored(&fx).time_remaining, 0);
    }

    #[tokio::test]
    async fn test_reopen_paused_keeps_stored_value() {
        let mut fx = fixture();
        fx.controller.initialize().await;
        fx.controller.start(10, 5).await.unwrap();
        fx.clock.advance_secs(10);
        for _ in 0..10 {
            fx.controller.tick().await;
        }
        fx.controller.pause().await;
        fx.controller.hide();

        fx.clock.advance_secs(100);
        assert_eq!(fx.controller.show().await, ForegroundPhase::Paused);
        assert_eq!(fx.controller.session().unwrap().time_remaining(), 290);
        assert!(!fx.controller.is_ticking());
    }

    #[tokio::test]
    async fn test_hidden_controller_does_not_tick() {
        let mut fx = fixture();
        fx.controller.initialize().await;
        fx.controller.start(10, 5).await.unwrap();
        fx.controller.hide();

        assert_eq!(fx.controller.tick().await, TickOutcome::Idle);
        assert!(!fx.controller.is_ticking());
        assert_eq!(stored(&fx).time_remaining, 300);
    }

    #[tokio::test]
    async fn test_reset_settings_removes_records() {
        let mut fx = fixture();
        fx.controller.initialize().await;
        fx.controller.start(12, 7).await.unwrap();
        fx.controller.reset_settings().await;

        assert_eq!(load_presentation_state(fx.store.as_ref()).unwrap(), None);
        assert_eq!(fx.controller.settings().slide_count, 10);
        assert_eq!(fx.controller.settings().presentation_time, 5);
        assert!(!fx.controller.is_ticking());
    }

    #[tokio::test]
    async fn test_corrupt_state_falls_back_to_settings_form() {
        let mut fx = fixture();
        fx.store
            .set(std::collections::HashMap::from([(
                "presentationState".to_string(),
                serde_json::json!({ "isRunning": "yes" }),
            )]))
            .unwrap();
        assert_eq!(fx.controller.initialize().await, ForegroundPhase::SettingsForm);
    }

    #[tokio::test]
    async fn test_store_failure_is_retried_on_next_tick() {
        let flaky = Arc::new(FlakyStore::new());
        let mut fx = fixture_with(flaky.clone());
        fx.controller.initialize().await;
        fx.controller.start(10, 5).await.unwrap();

        flaky.set_failing(true);
        assert_eq!(fx.controller.tick().await, TickOutcome::Ticked(299));
        assert!(fx.controller.has_pending_write());
        assert_eq!(stored(&fx).time_remaining, 300);

        flaky.set_failing(false);
        assert_eq!(fx.controller.tick().await, TickOutcome::Ticked(298));
        assert!(!fx.controller.has_pending_write());
        assert_eq!(stored(&fx).time_remaining, 298);
    }

    #[tokio::test]
    async fn test_indicator_failure_does_not_stop_countdown() {
        let mut fx = fixture();
        fx.controller.initialize().await;
        fx.controller.start(10, 5).await.unwrap();
        fx.sink.set_failing(true);

        assert_eq!(fx.controller.tick().await, TickOutcome::Ticked(299));
        assert_eq!(stored(&fx).time_remaining, 299);
    }

    #[tokio::test]
    async fn test_slide_navigation_is_bounded_and_persisted() {
        let mut fx = fixture();
        fx.controller.initialize().await;
        fx.controller.start(2, 5).await.unwrap();

        assert!(!fx.controller.previous_slide());
        assert!(fx.controller.next_slide());
        assert!(!fx.controller.next_slide());
        assert_eq!(stored(&fx).current_slide, 2);
        assert_eq!(fx.controller.view().remaining_slides, 0);
    }

    #[tokio::test]
    async fn test_set_current_time_only_lowers_clock() {
        let mut fx = fixture();
        fx.controller.initialize().await;
        fx.controller.start(10, 5).await.unwrap();

        assert!(fx.controller.set_current_time(125).await);
        assert!(!fx.controller.set_current_time(200).await);
        assert_eq!(stored(&fx).time_remaining, 125);
        assert_eq!(fx.controller.view().remaining_display, "02:05");
    }

    #[tokio::test]
    async fn test_settings_draft_refused_while_running() {
        let mut fx = fixture();
        fx.controller.initialize().await;
        fx.controller.update_settings_draft(15, 8).unwrap();
        assert_eq!(fx.controller.settings().slide_count, 15);

        fx.controller.start(15, 8).await.unwrap();
        assert!(fx.controller.update_settings_draft(3, 3).is_err());
    }

    #[tokio::test]
    async fn test_view_progress() {
        let mut fx = fixture();
        fx.controller.initialize().await;
        fx.controller.start(4, 1).await.unwrap();
        for _ in 0..30 {
            fx.controller.tick().await;
        }
        fx.controller.next_slide();

        let view = fx.controller.view();
        assert_eq!(view.remaining_display, "00:30");
        assert_eq!(view.time_progress, 50.0);
        assert_eq!(view.slide_progress, 25.0);
    }
}
