//! Test doubles shared by unit and integration tests

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::{
    error::StoreError,
    services::{Badge, BadgeSink},
    store::{MemoryStore, StateStore, StoreChange},
    utils::Clock,
};

/// Clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Fixed, readable starting instant
    pub fn at_nine() -> Self {
        Self::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap())
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    pub fn advance_secs(&self, seconds: i64) {
        self.advance(Duration::seconds(seconds));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Sink that remembers every badge it was asked to show
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    history: Arc<Mutex<Vec<Option<Badge>>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn history(&self) -> Vec<Option<Badge>> {
        self.history.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Option<Badge>> {
        self.history.lock().unwrap().last().cloned()
    }
}

impl BadgeSink for RecordingSink {
    fn apply(&mut self, badge: Option<&Badge>) -> Result<(), String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err("indicator unavailable".to_string());
        }
        self.history.lock().unwrap().push(badge.cloned());
        Ok(())
    }
}

/// Memory store whose writes can be switched to fail
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "quota exceeded",
            )));
        }
        Ok(())
    }
}

impl StateStore for FlakyStore {
    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError> {
        self.inner.get(keys)
    }

    fn set(&self, partial: HashMap<String, Value>) -> Result<(), StoreError> {
        self.check()?;
        self.inner.set(partial)
    }

    fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.check()?;
        self.inner.remove(keys)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.inner.subscribe()
    }
}
