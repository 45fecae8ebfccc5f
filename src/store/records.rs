//! Typed accessors for the records kept in the store

use std::collections::HashMap;
use serde_json::Value;
use tracing::warn;

use super::StateStore;
use crate::{
    error::{StoreError, TimerError},
    state::{PresentationState, Settings},
};

pub const PRESENTATION_STATE_KEY: &str = "presentationState";
pub const SETTINGS_KEY: &str = "presentationSettings";
pub const FOREGROUND_ACTIVE_KEY: &str = "foregroundActive";

/// Decode a raw store value as a presentation state
pub fn decode_presentation_state(value: &Value) -> Result<PresentationState, TimerError> {
    serde_json::from_value(value.clone()).map_err(|e| TimerError::StateCorruption {
        key: PRESENTATION_STATE_KEY.to_string(),
        reason: e.to_string(),
    })
}

/// Read the presentation state, if any
pub fn load_presentation_state(store: &dyn StateStore) -> Result<Option<PresentationState>, TimerError> {
    let values = store.get(&[PRESENTATION_STATE_KEY])?;
    values
        .get(PRESENTATION_STATE_KEY)
        .map(decode_presentation_state)
        .transpose()
}

pub fn save_presentation_state(store: &dyn StateStore, state: &PresentationState) -> Result<(), StoreError> {
    let value = serde_json::to_value(state)?;
    store.set(HashMap::from([(PRESENTATION_STATE_KEY.to_string(), value)]))
}

/// Read the settings, if any
pub fn load_settings(store: &dyn StateStore) -> Result<Option<Settings>, TimerError> {
    let values = store.get(&[SETTINGS_KEY])?;
    values
        .get(SETTINGS_KEY)
        .map(|value| {
            serde_json::from_value(value.clone()).map_err(|e| TimerError::StateCorruption {
                key: SETTINGS_KEY.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

/// Settings with every failure mode folded into the defaults
pub fn load_settings_or_default(store: &dyn StateStore) -> Settings {
    match load_settings(store) {
        Ok(Some(settings)) => settings,
        Ok(None) => Settings::default(),
        Err(e) => {
            warn!("Falling back to default settings: {}", e);
            Settings::default()
        }
    }
}

pub fn save_settings(store: &dyn StateStore, settings: &Settings) -> Result<(), StoreError> {
    let value = serde_json::to_value(settings)?;
    store.set(HashMap::from([(SETTINGS_KEY.to_string(), value)]))
}

/// Whether the foreground currently holds decrement authority.
///
/// Missing or non-boolean values read as inactive.
pub fn load_foreground_active(store: &dyn StateStore) -> Result<bool, StoreError> {
    let values = store.get(&[FOREGROUND_ACTIVE_KEY])?;
    Ok(values
        .get(FOREGROUND_ACTIVE_KEY)
        .and_then(Value::as_bool)
        .unwrap_or(false))
}

pub fn set_foreground_active(store: &dyn StateStore, active: bool) -> Result<(), StoreError> {
    store.set(HashMap::from([(FOREGROUND_ACTIVE_KEY.to_string(), Value::Bool(active))]))
}

/// Drop both the settings and the presentation state
pub fn clear_session_data(store: &dyn StateStore) -> Result<(), StoreError> {
    store.remove(&[SETTINGS_KEY, PRESENTATION_STATE_KEY])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_presentation_state_round_trips_through_store() {
        let store = MemoryStore::new();
        let state = PresentationState::started(300, Utc::now());
        save_presentation_state(&store, &state).unwrap();
        assert_eq!(load_presentation_state(&store).unwrap(), Some(state));
    }

    #[test]
    fn test_corrupt_state_is_reported() {
        let store = MemoryStore::new();
        store
            .set(HashMap::from([(PRESENTATION_STATE_KEY.to_string(), json!("garbage"))]))
            .unwrap();
        assert!(matches!(
            load_presentation_state(&store),
            Err(TimerError::StateCorruption { .. })
        ));
    }

    #[test]
    fn test_corrupt_settings_fall_back_to_defaults() {
        let store = MemoryStore::new();
        store
            .set(HashMap::from([(SETTINGS_KEY.to_string(), json!({ "slideCount": "many" }))]))
            .unwrap();
        assert_eq!(load_settings_or_default(&store).slide_count, 10);
    }

    #[test]
    fn test_foreground_flag_defaults_to_inactive() {
        let store = MemoryStore::new();
        assert!(!load_foreground_active(&store).unwrap());
        set_foreground_active(&store, true).unwrap();
        assert!(load_foreground_active(&store).unwrap());
    }

    #[test]
    fn test_clear_session_data_keeps_flag() {
        let store = MemoryStore::new();
        save_settings(&store, &Settings::default()).unwrap();
        save_presentation_state(&store, &PresentationState::idle(Utc::now())).unwrap();
        set_foreground_active(&store, true).unwrap();

        clear_session_data(&store).unwrap();
        assert_eq!(load_settings(&store).unwrap(), None);
        assert_eq!(load_presentation_state(&store).unwrap(), None);
        assert!(load_foreground_active(&store).unwrap());
    }
}
