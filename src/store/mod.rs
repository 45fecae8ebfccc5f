//! Persisted state store module
//!
//! A durable key/value store with change notifications. It is the only channel
//! between the foreground console and the background coordinator.

pub mod file;
pub mod memory;
pub mod records;

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::StoreError;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use records::*;

/// Capacity of the change notification bus
pub const CHANGE_BUS_CAPACITY: usize = 100;

/// One key mutation, delivered to every subscriber
#[derive(Debug, Clone, PartialEq)]
pub struct StoreChange {
    pub key: String,
    pub old_value: Option<Value>,
    /// `None` when the key was removed
    pub new_value: Option<Value>,
}

/// Key/value store shared by both execution surfaces
pub trait StateStore: Send + Sync {
    /// Read the given keys; missing keys are absent from the result
    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError>;

    /// Write every entry of `partial` at once
    fn set(&self, partial: HashMap<String, Value>) -> Result<(), StoreError>;

    /// Delete the given keys
    fn remove(&self, keys: &[&str]) -> Result<(), StoreError>;

    /// Subscribe to changes from any writer
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}
