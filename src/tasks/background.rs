//! Background coordinator task
//!
//! Keeps the badge and the persisted countdown moving while no foreground is
//! open. It never runs a per-second loop: it reacts to store changes and to the
//! coarse wake-up scheduler, and always recomputes from what is stored.

use std::sync::Arc;
use tokio::sync::{broadcast, broadcast::error::RecvError, mpsc};
use tracing::{debug, error, info, warn};

use crate::{
    api::messages::{Message, MessageResponse},
    error::TimerError,
    services::{IndicatorHandle, WakeEvent, WakeScheduler, PRESENTATION_ALARM, RUNNING_COLOR},
    state::PresentationState,
    store::{
        decode_presentation_state, load_foreground_active, load_presentation_state,
        load_settings_or_default, save_presentation_state, save_settings, set_foreground_active,
        StateStore, StoreChange, PRESENTATION_STATE_KEY,
    },
    utils::Clock,
};

/// What a single wake-up did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeOutcome {
    /// Nothing running; badge cleared and alarm disarmed
    Idle,
    /// The foreground holds decrement authority; badge refreshed only
    Deferred,
    /// Counter lowered and persisted
    Decremented(u64),
    /// Counter reached zero; session stopped
    Expired,
    /// The store could not be read or written
    StoreFailure,
}

/// Coordinator that outlives the foreground surface
pub struct BackgroundCoordinator {
    store: Arc<dyn StateStore>,
    indicator: IndicatorHandle,
    scheduler: WakeScheduler,
    clock: Arc<dyn Clock>,
    wake_interval_minutes: u64,
}

impl BackgroundCoordinator {
    pub fn new(
        store: Arc<dyn StateStore>,
        indicator: IndicatorHandle,
        scheduler: WakeScheduler,
        clock: Arc<dyn Clock>,
        wake_interval_minutes: u64,
    ) -> Self {
        Self {
            store,
            indicator,
            scheduler,
            clock,
            wake_interval_minutes: wake_interval_minutes.max(1),
        }
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn indicator(&self) -> &IndicatorHandle {
        &self.indicator
    }

    pub fn scheduler(&self) -> &WakeScheduler {
        &self.scheduler
    }

    /// Seconds removed from the clock per unobserved wake-up
    pub fn wake_step_seconds(&self) -> u64 {
        self.wake_interval_minutes * 60
    }

    /// Cold start: any foreground flag left behind belongs to a dead process,
    /// and a session that was running must not be orphaned.
    pub async fn recover_on_start(&self) {
        info!("Recovering persisted presentation state");
        if let Err(e) = set_foreground_active(self.store.as_ref(), false) {
            error!("Failed to clear stale foreground flag: {}", e);
        }
        self.reconcile().await;
    }

    /// Reread the stored state and arm/disarm accordingly
    pub async fn reconcile(&self) {
        match load_presentation_state(self.store.as_ref()) {
            Ok(state) => self.follow_state(state.as_ref()).await,
            Err(TimerError::StateCorruption { key, reason }) => {
                warn!("Ignoring corrupt '{}': {}", key, reason);
                self.follow_state(None).await;
            }
            Err(e) => error!("Failed to read presentation state: {}", e),
        }
    }

    /// React to a store mutation from any writer
    pub async fn on_state_change(&self, change: &StoreChange) {
        if change.key != PRESENTATION_STATE_KEY {
            return;
        }

        let state = match change.new_value.as_ref().map(decode_presentation_state).transpose() {
            Ok(state) => state,
            Err(e) => {
                warn!("Treating unreadable presentation state as stopped: {}", e);
                None
            }
        };
        self.follow_state(state.as_ref()).await;
    }

    async fn follow_state(&self, state: Option<&PresentationState>) {
        match state {
            Some(state) if state.is_running => {
                debug!("Session running with {}s left", state.time_remaining);
                self.scheduler.arm(PRESENTATION_ALARM, self.wake_interval_minutes);
                self.indicator.show_state(Some(state)).await;
            }
            _ => {
                self.scheduler.disarm(PRESENTATION_ALARM);
                self.indicator.show_state(None).await;
            }
        }
    }

    /// Handle one firing of the presentation alarm
    pub async fn on_wake(&self) -> WakeOutcome {
        let mut state = match load_presentation_state(self.store.as_ref()) {
            Ok(Some(state)) => state,
            Ok(None) => return self.go_idle().await,
            Err(TimerError::StateCorruption { key, reason }) => {
                warn!("Ignoring corrupt '{}' on wake-up: {}", key, reason);
                return self.go_idle().await;
            }
            Err(e) => {
                error!("Failed to read presentation state on wake-up: {}", e);
                return WakeOutcome::StoreFailure;
            }
        };

        if !state.has_time_left() {
            debug!("Wake-up found nothing counting down");
            return self.go_idle().await;
        }

        let foreground_active = match load_foreground_active(self.store.as_ref()) {
            Ok(active) => active,
            Err(e) => {
                // Unknown authority: do not risk a double decrement
                warn!("Failed to read foreground flag, deferring: {}", e);
                true
            }
        };
        if foreground_active {
            debug!("Foreground active, leaving {}s untouched", state.time_remaining);
            self.indicator.show_state(Some(&state)).await;
            return WakeOutcome::Deferred;
        }

        let now = self.clock.now();
        let remaining = state.decrement(self.wake_step_seconds(), now);
        if remaining == 0 {
            info!("Presentation time expired while in background");
            state.mark_stopped(now);
        }

        if let Err(e) = save_presentation_state(self.store.as_ref(), &state) {
            // The alarm stays armed: the next wake rereads the store and retries
            error!("Failed to persist presentation state on wake-up: {}", e);
            self.indicator.show_state(Some(&state)).await;
            return WakeOutcome::StoreFailure;
        }

        if remaining == 0 {
            self.go_idle().await;
            WakeOutcome::Expired
        } else {
            debug!("Background decremented to {}s", remaining);
            self.indicator.show_state(Some(&state)).await;
            WakeOutcome::Decremented(remaining)
        }
    }

    async fn go_idle(&self) -> WakeOutcome {
        self.scheduler.disarm(PRESENTATION_ALARM);
        self.indicator.show_state(None).await;
        WakeOutcome::Idle
    }

    /// Answer one request from the foreground
    pub async fn handle_message(&self, message: Message) -> MessageResponse {
        match message {
            Message::UpdateBadge { text } => {
                let result = if text.is_empty() {
                    self.indicator.clear().await
                } else {
                    self.indicator.render(&text, RUNNING_COLOR).await
                };
                match result {
                    Ok(()) => MessageResponse::ok(),
                    Err(e) => {
                        warn!("Badge update request failed: {}", e);
                        MessageResponse::failure(e.to_string())
                    }
                }
            }
            Message::GetSettings => MessageResponse::Settings {
                settings: load_settings_or_default(self.store.as_ref()),
            },
            Message::UpdateSettings { settings } => {
                if let Err(e) = settings.validate() {
                    return MessageResponse::failure(e.to_string());
                }
                match load_presentation_state(self.store.as_ref()) {
                    Ok(Some(state)) if state.is_running => {
                        return MessageResponse::failure("settings cannot change while a presentation is running");
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Could not check running state before settings update: {}", e),
                }
                match save_settings(self.store.as_ref(), &settings) {
                    Ok(()) => {
                        info!(
                            "Settings updated: {} slides, {} min",
                            settings.slide_count, settings.presentation_time
                        );
                        MessageResponse::ok()
                    }
                    Err(e) => {
                        error!("Failed to save settings: {}", e);
                        MessageResponse::failure(e.to_string())
                    }
                }
            }
        }
    }

    /// Event loop: store changes and wake-ups, handled strictly in arrival order
    pub async fn run(
        self: Arc<Self>,
        mut changes: broadcast::Receiver<StoreChange>,
        mut wakes: mpsc::UnboundedReceiver<WakeEvent>,
    ) {
        info!("Starting background coordinator");

        loop {
            tokio::select! {
                change = changes.recv() => match change {
                    Ok(change) => self.on_state_change(&change).await,
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Missed {} store changes, rereading state", missed);
                        self.reconcile().await;
                    }
                    Err(RecvError::Closed) => {
                        info!("Store closed, stopping background coordinator");
                        break;
                    }
                },
                Some(event) = wakes.recv() => {
                    if event.name == PRESENTATION_ALARM {
                        let outcome = self.on_wake().await;
                        debug!("Wake-up outcome: {:?}", outcome);
                    } else {
                        debug!("Ignoring alarm '{}'", event.name);
                    }
                }
                else => break,
            }
        }
    }
}
