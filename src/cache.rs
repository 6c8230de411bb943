use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::CacheConfig;

/// Get the platform-appropriate directory for persisted lookup results
pub fn get_cache_path() -> PathBuf {
    dirs::cache_dir()
        .map(|p| p.join("plate-score/results"))
        .unwrap_or_else(|| {
            PathBuf::from(format!(
                "{}/.cache/plate-score/results",
                std::env::var("HOME").unwrap_or_default()
            ))
        })
}

/// Remove a persisted cache directory
pub fn clear_cache_dir(path: &Path) -> Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).context("Failed to remove cache directory"),
    }
}

/// Stored value plus the moment it was written
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    value: serde_json::Value,
    stored_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_fresh(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return true;
        };
        now.signed_duration_since(self.stored_at) <= max_age
    }
}

/// Memoizes lookup results per entity key.
///
/// One instance is shared by every component in the process; keys are
/// namespaced by the caller ("places:details:<id>", "inspections:<name>|<addr>").
/// Values are held as JSON so a single cache serves every record type, and
/// are optionally mirrored to disk with cacache so the freshness window
/// survives restarts.
///
/// A read only hits when the entry is no older than the freshness threshold
/// the caller passes in; stale entries are reported as misses.
#[derive(Clone)]
pub struct ResultCache {
    inner: Arc<Mutex<HashMap<String, CacheEntry>>>,
    disk_path: Option<PathBuf>,
    capacity: Option<usize>,
}

impl ResultCache {
    /// Memory-only cache
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            disk_path: None,
            capacity: None,
        }
    }

    /// Cache mirrored to a cacache directory. Entries are loaded on demand.
    pub fn persistent(path: PathBuf) -> Self {
        Self {
            disk_path: Some(path),
            ..Self::in_memory()
        }
    }

    /// Cache described by the `cache` config section
    pub fn from_config(config: &CacheConfig) -> Self {
        let cache = if config.persist {
            Self::persistent(config.path.clone().unwrap_or_else(get_cache_path))
        } else {
            Self::in_memory()
        };
        match config.capacity {
            Some(capacity) => cache.with_capacity(capacity),
            None => cache,
        }
    }

    /// Bound the number of in-memory entries; the oldest entry is dropped first.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity.max(1));
        self
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up `key`, returning it only if it was stored within `max_age`.
    pub fn get<T: DeserializeOwned>(&self, key: &str, max_age: Duration) -> Option<T> {
        let entry = {
            let data = self.lock();
            data.get(key).cloned()
        };
        let entry = match entry {
            Some(entry) => entry,
            None => self.load_from_disk(key)?,
        };

        if !entry.is_fresh(max_age, Utc::now()) {
            tracing::debug!(key, stored_at = %entry.stored_at, "Cache entry is stale");
            return None;
        }

        match serde_json::from_value(entry.value) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(key, error = %e, "Cache entry has unexpected shape");
                None
            }
        }
    }

    /// Store `value` under `key`, stamped with the current time.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) {
        self.put_at(key, value, Utc::now());
    }

    /// Store `value` with an explicit timestamp (e.g. when backfilling from durable storage).
    pub fn put_at<T: Serialize>(&self, key: &str, value: &T, stored_at: DateTime<Utc>) {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to serialize cache value");
                return;
            }
        };
        let entry = CacheEntry { value, stored_at };

        {
            let mut data = self.lock();
            data.insert(key.to_string(), entry.clone());
            self.evict_overflow(&mut data);
        }

        // Write to disk (fire-and-forget, don't block on disk errors)
        if let Some(path) = &self.disk_path {
            if let Ok(serialized) = serde_json::to_vec(&entry) {
                if let Err(e) = cacache::write_sync(path, key, &serialized) {
                    tracing::debug!(key, error = %e, "Failed to persist cache entry");
                }
            }
        }
    }

    /// Forget everything held in memory. Persisted entries are untouched.
    pub fn clear_memory(&self) {
        self.lock().clear();
    }

    /// Drop every entry, in memory and on disk.
    pub fn clear(&self) -> Result<()> {
        self.clear_memory();
        match &self.disk_path {
            Some(path) => clear_cache_dir(path),
            None => Ok(()),
        }
    }

    fn load_from_disk(&self, key: &str) -> Option<CacheEntry> {
        let path = self.disk_path.as_ref()?;
        let bytes = cacache::read_sync(path, key).ok()?;
        let entry: CacheEntry = serde_json::from_slice(&bytes).ok()?;

        // Populate in-memory cache for subsequent hits
        let mut data = self.lock();
        data.insert(key.to_string(), entry.clone());
        self.evict_overflow(&mut data);

        Some(entry)
    }

    fn evict_overflow(&self, data: &mut HashMap<String, CacheEntry>) {
        let Some(capacity) = self.capacity else {
            return;
        };
        while data.len() > capacity {
            let oldest = data
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    data.remove(&key);
                }
                None => break,
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        // A poisoned lock only means another thread panicked mid-insert; the map is still usable
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::in_memory()
    }
}
