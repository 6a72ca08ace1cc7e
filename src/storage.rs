use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Key under which the opaque bearer token is persisted.
pub const AUTH_TOKEN_KEY: &str = "authToken";
/// Key under which the serialized user snapshot is persisted.
pub const CURRENT_USER_KEY: &str = "currentUser";

const SESSION_FILE: &str = "session.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Durable string key/value storage, synchronous like browser local storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Process-local store; nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    inner: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).map(|v| v.value().clone())
    }
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.inner.insert(key.to_string(), value.to_string());
        Ok(())
    }
    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key);
        Ok(())
    }
}

/// Single JSON document under a directory, rewritten on every mutation.
pub struct FileStore {
    path: PathBuf,
    state: RwLock<HashMap<String, String>>,
}

impl FileStore {
    pub fn open(dir: impl AsRef<Path>) -> Self {
        let path = dir.as_ref().join(SESSION_FILE);
        let state = Self::load_from(&path);
        Self { path, state: RwLock::new(state) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from(path: &Path) -> HashMap<String, String> {
        match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(map) => {
                    debug!("loaded session store '{}'", path.display());
                    map
                }
                Err(e) => {
                    warn!("failed to parse session store '{}': {e}; starting empty", path.display());
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                error!("failed to read session store '{}': {e}; starting empty", path.display());
                HashMap::new()
            }
        }
    }

    fn persist(&self, state: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        restrict_permissions(&tmp)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.state.read().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut s = self.state.write().unwrap_or_else(PoisonError::into_inner);
        s.insert(key.to_string(), value.to_string());
        self.persist(&s)
    }
    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut s = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if s.remove(key).is_none() {
            return Ok(());
        }
        self.persist(&s)
    }
}
