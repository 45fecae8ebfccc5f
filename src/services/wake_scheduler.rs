//! Coarse wake-up scheduler with named alarms

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, info};

/// Alarm that drives the background countdown
pub const PRESENTATION_ALARM: &str = "presentation-timer";

/// Fired each time an armed alarm comes due
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeEvent {
    pub name: String,
}

#[derive(Debug)]
struct Alarm {
    interval_minutes: u64,
    handle: JoinHandle<()>,
}

/// Periodic alarms keyed by name.
///
/// Arming is idempotent: re-arming an alarm with the same interval keeps its
/// current schedule. Events are delivered on the receiver returned from
/// [`WakeScheduler::new`].
#[derive(Debug, Clone)]
pub struct WakeScheduler {
    alarms: Arc<Mutex<HashMap<String, Alarm>>>,
    event_tx: mpsc::UnboundedSender<WakeEvent>,
    period_unit: Duration,
}

impl WakeScheduler {
    /// Scheduler whose intervals are counted in real minutes
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WakeEvent>) {
        Self::with_period_unit(Duration::from_secs(60))
    }

    /// Scheduler where one "minute" of interval lasts `unit`
    pub fn with_period_unit(unit: Duration) -> (Self, mpsc::UnboundedReceiver<WakeEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            alarms: Arc::new(Mutex::new(HashMap::new())),
            event_tx,
            period_unit: unit,
        };
        (scheduler, event_rx)
    }

    fn alarms(&self) -> MutexGuard<'_, HashMap<String, Alarm>> {
        // Alarm bookkeeping stays consistent even if a holder panicked
        self.alarms.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Arm `name` to fire every `interval_minutes`. Returns `true` if a new
    /// schedule was started.
    pub fn arm(&self, name: &str, interval_minutes: u64) -> bool {
        let interval_minutes = interval_minutes.max(1);
        let mut alarms = self.alarms();

        if let Some(existing) = alarms.get(name) {
            if existing.interval_minutes == interval_minutes && !existing.handle.is_finished() {
                debug!("Alarm '{}' already armed", name);
                return false;
            }
        }

        let period = self.period_unit * u32::try_from(interval_minutes).unwrap_or(u32::MAX);
        let handle = tokio::spawn(fire_loop(name.to_string(), period, self.event_tx.clone()));
        if let Some(previous) = alarms.insert(name.to_string(), Alarm { interval_minutes, handle }) {
            previous.handle.abort();
        }

        info!("Alarm '{}' armed every {} min", name, interval_minutes);
        true
    }

    /// Cancel `name`. Returns `true` if it was armed.
    pub fn disarm(&self, name: &str) -> bool {
        match self.alarms().remove(name) {
            Some(alarm) => {
                alarm.handle.abort();
                info!("Alarm '{}' disarmed", name);
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, name: &str) -> bool {
        self.alarms()
            .get(name)
            .is_some_and(|alarm| !alarm.handle.is_finished())
    }

    pub fn interval_minutes(&self, name: &str) -> Option<u64> {
        self.alarms().get(name).map(|alarm| alarm.interval_minutes)
    }
}

async fn fire_loop(name: String, period: Duration, event_tx: mpsc::UnboundedSender<WakeEvent>) {
    let mut ticker = interval_at(Instant::now() + period, period);
    // A host that slept through several periods gets one wake-up, not a burst
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        debug!("Alarm '{}' fired", name);
        if event_tx.send(WakeEvent { name: name.clone() }).is_err() {
            break;
        }
    }
}
