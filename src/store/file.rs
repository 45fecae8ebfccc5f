//! JSON-file store backend

use std::{
    collections::HashMap,
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use serde_json::Value;
use tempfile::NamedTempFile;
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::{MemoryStore, StateStore, StoreChange};
use crate::error::StoreError;

/// Store persisted as one pretty-printed JSON object on disk.
///
/// Every write lands in a uniquely named sibling temp file first and is
/// renamed over the target, so a crash mid-write leaves the previous contents
/// intact.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl FileStore {
    /// Open the store at `path`. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = load_entries(&path);
        info!("Opened state store at {} ({} keys)", path.display(), entries.len());
        Self {
            path,
            inner: MemoryStore::with_entries(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn load_entries(path: &Path) -> HashMap<String, Value> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return HashMap::new(),
        Err(e) => {
            warn!("Failed to read state store {}: {}, starting empty", path.display(), e);
            return HashMap::new();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("State store {} is not valid JSON: {}, starting empty", path.display(), e);
            HashMap::new()
        }
    }
}

fn write_entries(path: &Path, entries: &HashMap<String, Value>) -> Result<(), StoreError> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };

    let body = serde_json::to_vec_pretty(entries)?;
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(&body)?;
    temp.flush()?;
    temp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

impl StateStore for FileStore {
    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError> {
        self.inner.get(keys)
    }

    fn set(&self, partial: HashMap<String, Value>) -> Result<(), StoreError> {
        self.inner.set_with(partial, |entries| write_entries(&self.path, entries))
    }

    fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.inner.remove_with(keys, |entries| write_entries(&self.path, entries))
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.inner.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_path(name: &str) -> PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir()
            .join(format!("slide-timer-{}-{}", std::process::id(), n))
            .join(name)
    }

    #[test]
    fn test_values_survive_reopen() {
        let path = temp_path("state.json");
        {
            let store = FileStore::open(&path);
            store.set(HashMap::from([("foregroundActive".to_string(), json!(true))])).unwrap();
        }
        let reopened = FileStore::open(&path);
        let values = reopened.get(&["foregroundActive"]).unwrap();
        assert_eq!(values["foregroundActive"], json!(true));
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let path = temp_path("corrupt.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        let store = FileStore::open(&path);
        assert!(store.get(&["presentationState"]).unwrap().is_empty());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_remove_is_persisted() {
        let path = temp_path("remove.json");
        let store = FileStore::open(&path);
        store.set(HashMap::from([("a".to_string(), json!(1))])).unwrap();
        store.remove(&["a"]).unwrap();

        let reopened = FileStore::open(&path);
        assert!(reopened.get(&["a"]).unwrap().is_empty());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_writes_leave_no_temp_files_behind() {
        let path = temp_path("state.json");
        let store = FileStore::open(&path);
        for n in 0..3 {
            store.set(HashMap::from([("a".to_string(), json!(n))])).unwrap();
        }

        let names: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("state.json")]);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_unwritable_path_surfaces_io_error() {
        let dir = temp_path("blocker");
        fs::create_dir_all(dir.parent().unwrap()).unwrap();
        // A regular file where the parent directory should be
        fs::write(&dir, "x").unwrap();
        let store = FileStore::open(dir.join("state.json"));

        let result = store.set(HashMap::from([("a".to_string(), json!(1))]));
        assert!(matches!(result, Err(StoreError::Io(_))));
        assert!(store.get(&["a"]).unwrap().is_empty());
        let _ = fs::remove_dir_all(dir.parent().unwrap());
    }
}
