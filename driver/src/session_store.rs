use common::errors::StoreError;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Durable key-value store backing the driver session.
///
/// The session persists status, vehicle, shift start and active order under
/// fixed keys and removes the entry when a field goes back to empty, so a
/// restart reads exactly what was last written. Implementations must
/// tolerate absent keys; corrupt values surface as errors and the session
/// fails open to defaults on read.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Stores the session entries in a single JSON object on disk.
pub struct FileSessionStore {
    /// Location of the session file.
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads the whole entry map; a missing or empty file is an empty map.
    fn load_map(&self) -> Result<HashMap<String, String>, StoreError> {
        match fs::read(&self.path) {
            Ok(data) => {
                if data.is_empty() {
                    return Ok(HashMap::new());
                }
                serde_json::from_slice(&data).map_err(|e| StoreError::Corrupt(e.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(StoreError::Io(e.to_string())),
        }
    }

    /// Loads the map for a write. A corrupt file must not block new writes,
    /// so it is treated as empty and overwritten by the next save.
    fn load_map_for_write(&self) -> Result<HashMap<String, String>, StoreError> {
        match self.load_map() {
            Ok(map) => Ok(map),
            Err(StoreError::Corrupt(_)) => Ok(HashMap::new()),
            Err(e) => Err(e),
        }
    }

    fn save_map(&self, map: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
            }
        }
        let data = serde_json::to_vec_pretty(map).map_err(|e| StoreError::Io(e.to_string()))?;
        fs::write(&self.path, data).map_err(|e| StoreError::Io(e.to_string()))
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut map = self.load_map_for_write()?;
        map.insert(key.to_string(), value.to_string());
        self.save_map(&map)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut map = self.load_map_for_write()?;
        if map.remove(key).is_none() {
            return Ok(());
        }
        self.save_map(&map)
    }
}

/// In-memory store used by tests. Writes can be switched to fail so tests
/// can observe how persistence errors surface.
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
    reject_writes: AtomicBool,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            reject_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.reject_writes.store(fail, Ordering::SeqCst);
    }

    /// Direct peek at an entry, for assertions.
    pub fn entry(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes rejected".to_string()));
        }
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes rejected".to_string()));
        }
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}
