//! In-memory store backend

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use super::{StateStore, StoreChange, CHANGE_BUS_CAPACITY};
use crate::error::StoreError;

/// Store that keeps everything in process memory.
///
/// Also the core of [`super::FileStore`], which adds a persist step to every commit.
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
    change_tx: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::with_entries(HashMap::new())
    }

    /// Create a store pre-populated with `entries`
    pub fn with_entries(entries: HashMap<String, Value>) -> Self {
        let (change_tx, _) = broadcast::channel(CHANGE_BUS_CAPACITY);
        Self {
            entries: Mutex::new(entries),
            change_tx,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Value>>, StoreError> {
        self.entries
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("Failed to lock store: {}", e)))
    }

    /// Apply `mutate` to a copy of the entries, run `persist` on the result and
    /// only then swap it in and notify subscribers.
    pub(crate) fn commit<M, P>(&self, mutate: M, persist: P) -> Result<(), StoreError>
    where
        M: FnOnce(&mut HashMap<String, Value>) -> Vec<StoreChange>,
        P: FnOnce(&HashMap<String, Value>) -> Result<(), StoreError>,
    {
        let mut entries = self.lock()?;
        let mut next = entries.clone();
        let changes = mutate(&mut next);
        persist(&next)?;
        *entries = next;
        drop(entries);

        for change in changes {
            debug!("Store change on '{}'", change.key);
            // No subscribers is fine
            let _ = self.change_tx.send(change);
        }
        Ok(())
    }

    pub(crate) fn set_with<P>(&self, partial: HashMap<String, Value>, persist: P) -> Result<(), StoreError>
    where
        P: FnOnce(&HashMap<String, Value>) -> Result<(), StoreError>,
    {
        self.commit(
            |entries| {
                partial
                    .into_iter()
                    .map(|(key, value)| {
                        let old_value = entries.insert(key.clone(), value.clone());
                        StoreChange { key, old_value, new_value: Some(value) }
                    })
                    .collect()
            },
            persist,
        )
    }

    pub(crate) fn remove_with<P>(&self, keys: &[&str], persist: P) -> Result<(), StoreError>
    where
        P: FnOnce(&HashMap<String, Value>) -> Result<(), StoreError>,
    {
        self.commit(
            |entries| {
                keys.iter()
                    .filter_map(|key| {
                        entries.remove(*key).map(|old| StoreChange {
                            key: key.to_string(),
                            old_value: Some(old),
                            new_value: None,
                        })
                    })
                    .collect()
            },
            persist,
        )
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError> {
        let entries = self.lock()?;
        Ok(keys
            .iter()
            .filter_map(|key| entries.get(*key).map(|value| (key.to_string(), value.clone())))
            .collect())
    }

    fn set(&self, partial: HashMap<String, Value>) -> Result<(), StoreError> {
        self.set_with(partial, |_| Ok(()))
    }

    fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.remove_with(keys, |_| Ok(()))
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.change_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_returns_only_present_keys() {
        let store = MemoryStore::new();
        store.set(HashMap::from([("a".to_string(), json!(1))])).unwrap();
        let values = store.get(&["a", "b"]).unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values["a"], json!(1));
    }

    #[tokio::test]
    async fn test_set_notifies_with_old_and_new_value() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();
        store.set(HashMap::from([("a".to_string(), json!(1))])).unwrap();
        store.set(HashMap::from([("a".to_string(), json!(2))])).unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.old_value, None);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.old_value, Some(json!(1)));
        assert_eq!(second.new_value, Some(json!(2)));
    }

    #[tokio::test]
    async fn test_remove_notifies_only_for_existing_keys() {
        let store = MemoryStore::new();
        store.set(HashMap::from([("a".to_string(), json!(true))])).unwrap();
        let mut rx = store.subscribe();
        store.remove(&["a", "missing"]).unwrap();

        let change = rx.recv().await.unwrap();
        assert_eq!(change.key, "a");
        assert_eq!(change.new_value, None);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_failed_persist_leaves_entries_untouched() {
        let store = MemoryStore::new();
        let result = store.set_with(HashMap::from([("a".to_string(), json!(1))]), |_| {
            Err(StoreError::Unavailable("disk full".to_string()))
        });
        assert!(result.is_err());
        assert!(store.get(&["a"]).unwrap().is_empty());
    }
}
