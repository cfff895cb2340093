//! Device-scoped key/value persistence.
//!
//! The local session collection, local messages, and the anonymous quota
//! counter are all kept as JSON text under well-known keys behind this
//! interface. A file-backed implementation survives process restarts; an
//! in-memory implementation backs tests and demos.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use confer_core::error::{ConferError, Result};

/// String key/value persistence scoped to one device profile.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the stored value for `key`, or `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Replace characters that are unsafe in file names.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// File-backed store: one file per key inside a data directory.
///
/// The value is written as the raw file content, so corrupt state stays
/// inspectable with ordinary tools.
#[derive(Debug, Clone)]
pub struct FileKvStore {
    dir: PathBuf,
}

impl FileKvStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(sanitize_key(key))
    }
}

#[async_trait]
impl KeyValueStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConferError::Io(e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        tokio::fs::write(&path, value).await?;
        debug!(key, path = %path.display(), "Key written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ConferError::Io(e)),
        }
    }
}

/// In-memory store for tests and demos.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| ConferError::Store(format!("kv lock poisoned: {}", e)))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| ConferError::Store(format!("kv lock poisoned: {}", e)))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| ConferError::Store(format!("kv lock poisoned: {}", e)))?;
        entries.remove(key);
        Ok(())
    }
}

/// Convenience for opening the default file store under a data directory.
pub fn open_default(data_dir: &Path) -> FileKvStore {
    FileKvStore::new(data_dir.join("kv"))
}
