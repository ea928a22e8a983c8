//! File-backed TTL cache for upstream API responses.
//!
//! One JSON file per cache (e.g. ~/.cityzen/weather.json). Keys are
//! case-insensitive. An entry older than the TTL is invisible to `get` and
//! removed by `evict_expired`, which the refresh job runs periodically.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

#[derive(Serialize, Deserialize, Clone)]
struct CacheEntry<T> {
    value: T,
    /// Insertion time, unix milliseconds.
    timestamp: i64,
}

/// A persistent key → value cache with a fixed time-to-live.
pub struct TtlCache<T> {
    path: PathBuf,
    ttl_ms: i64,
    entries: HashMap<String, CacheEntry<T>>,
}

impl<T> TtlCache<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// Load from `path`. A missing or unreadable file starts an empty cache.
    pub fn load_from(path: PathBuf, ttl: Duration) -> Self {
        let entries = Self::read_file(&path).unwrap_or_default();
        Self {
            path,
            ttl_ms: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            entries,
        }
    }

    fn read_file(path: &Path) -> Option<HashMap<String, CacheEntry<T>>> {
        let data = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&data) {
            Ok(entries) => Some(entries),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discarding unreadable cache file");
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<T> {
        self.get_at(key, Utc::now().timestamp_millis())
    }

    /// Look up `key` as of `now_ms`. Returns None if missing or expired.
    pub fn get_at(&self, key: &str, now_ms: i64) -> Option<T> {
        let entry = self.entries.get(&key.to_lowercase())?;
        if self.is_expired(entry, now_ms) {
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn put(&mut self, key: &str, value: T) {
        self.put_at(key, value, Utc::now().timestamp_millis());
    }

    pub fn put_at(&mut self, key: &str, value: T, now_ms: i64) {
        self.entries.insert(
            key.to_lowercase(),
            CacheEntry { value, timestamp: now_ms },
        );
        self.persist();
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn evict_expired(&mut self, now_ms: i64) -> usize {
        let ttl_ms = self.ttl_ms;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now_ms.saturating_sub(entry.timestamp) <= ttl_ms);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            self.persist();
        }
        evicted
    }

    /// Rewrite every live value in place, keeping its original timestamp.
    /// `f` returns how many changes it made; the total is returned.
    pub fn update_all<F>(&mut self, now_ms: i64, mut f: F) -> usize
    where
        F: FnMut(&mut T) -> usize,
    {
        let ttl_ms = self.ttl_ms;
        let changed: usize = self
            .entries
            .values_mut()
            .filter(|entry| now_ms.saturating_sub(entry.timestamp) <= ttl_ms)
            .map(|entry| f(&mut entry.value))
            .sum();
        if changed > 0 {
            self.persist();
        }
        changed
    }

    fn is_expired(&self, entry: &CacheEntry<T>, now_ms: i64) -> bool {
        now_ms.saturating_sub(entry.timestamp) > self.ttl_ms
    }

    fn persist(&self) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(path = %parent.display(), error = %e, "could not create cache directory");
                return;
            }
        }
        let json = match serde_json::to_string_pretty(&self.entries) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "could not serialise cache");
                return;
            }
        };
        if let Err(e) = fs::write(&self.path, json) {
            warn!(path = %self.path.display(), error = %e, "could not write cache file");
        }
    }

    /// Number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
