//! Durable key/value storage that survives restarts.
//!
//! All keys owned by one [`Store`] share a prefix, so the backing file can hold
//! unrelated data written by someone else; [`Store::clear`] only touches the
//! prefixed keys. Each value is kept with the time it was written and an
//! optional time-to-live. Expiry is checked on read.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use scribe_logging::{scribe_debug, scribe_warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::persist::{read_optional, AtomicFileWriter, PersistError};

/// Milliseconds since the Unix epoch.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage path {0:?} has no file name")]
    InvalidPath(PathBuf),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    value: Value,
    timestamp: i64,
    /// Lifetime in milliseconds; 0 never expires.
    #[serde(default)]
    ttl: i64,
}

pub struct Store {
    dir: PathBuf,
    file_name: String,
    prefix: String,
    clock: Clock,
    data: BTreeMap<String, Value>,
}

impl Store {
    /// Opens (or starts) the store backed by `path`. A missing file is an empty
    /// store; an unreadable one is logged and replaced on the next write.
    pub fn open(path: &Path, prefix: impl Into<String>) -> Result<Self, StoreError> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| StoreError::InvalidPath(path.to_path_buf()))?
            .to_string();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let data = match read_optional(path)? {
            None => BTreeMap::new(),
            Some(text) => match serde_json::from_str(&text) {
                Ok(data) => data,
                Err(err) => {
                    scribe_warn!("Ignoring unreadable storage file {:?}: {}", path, err);
                    BTreeMap::new()
                }
            },
        };

        Ok(Self {
            dir,
            file_name,
            prefix: prefix.into(),
            clock: Arc::new(|| chrono::Utc::now().timestamp_millis()),
            data,
        })
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the stored value, or `None` when it is missing, expired or of
    /// another shape. Expired entries are deleted.
    pub fn get<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        let full_key = self.full_key(key);
        let raw = self.data.get(&full_key)?.clone();
        let entry: StoredEntry = match serde_json::from_value(raw) {
            Ok(entry) => entry,
            Err(err) => {
                scribe_warn!("Malformed storage entry {}: {}", full_key, err);
                return None;
            }
        };

        if entry.ttl > 0 && (self.clock)() - entry.timestamp > entry.ttl {
            scribe_debug!("Storage entry {} expired", full_key);
            if let Err(err) = self.remove(key) {
                scribe_warn!("Failed to delete expired entry {}: {}", full_key, err);
            }
            return None;
        }

        match serde_json::from_value(entry.value) {
            Ok(value) => Some(value),
            Err(err) => {
                scribe_warn!("Storage entry {} has an unexpected shape: {}", full_key, err);
                None
            }
        }
    }

    pub fn get_or<T: DeserializeOwned>(&mut self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn set<T: Serialize>(
        &mut self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let entry = StoredEntry {
            value: serde_json::to_value(value)?,
            timestamp: (self.clock)(),
            ttl: ttl.map_or(0, |ttl| i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)),
        };
        let full_key = self.full_key(key);
        self.data.insert(full_key, serde_json::to_value(entry)?);
        self.flush()
    }

    /// Returns whether the key existed.
    pub fn remove(&mut self, key: &str) -> Result<bool, StoreError> {
        let full_key = self.full_key(key);
        let existed = self.data.remove(&full_key).is_some();
        if existed {
            self.flush()?;
        }
        Ok(existed)
    }

    /// Removes every key with this store's prefix and returns how many went.
    pub fn clear(&mut self) -> Result<usize, StoreError> {
        let before = self.data.len();
        let prefix = self.prefix.clone();
        self.data.retain(|key, _| !key.starts_with(&prefix));
        let removed = before - self.data.len();
        if removed > 0 {
            self.flush()?;
        }
        Ok(removed)
    }

    /// Presence only: an expired entry still counts until a `get` deletes it.
    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(&self.full_key(key))
    }

    /// Keys owned by this store, without the prefix.
    pub fn keys(&self) -> Vec<String> {
        self.data
            .keys()
            .filter_map(|key| key.strip_prefix(&self.prefix))
            .map(ToOwned::to_owned)
            .collect()
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn flush(&self) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(&self.data)?;
        AtomicFileWriter::new(self.dir.clone()).write(&self.file_name, &content)?;
        Ok(())
    }
}
