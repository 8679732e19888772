// Bounded persistent store.
// Serializes cache records as JSON over a medium, bounds each namespace by
// entry count, and absorbs every storage failure as a cache miss.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, info};

use super::key::CacheKey;
use super::medium::{Medium, Namespace};

/// A persisted cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord<T> {
    /// Key the record was written under; guards against medium-level mixups.
    pub key: CacheKey,
    /// The cached value.
    pub payload: T,
    /// Fingerprint of the source content, when freshness is content based.
    pub fingerprint: Option<String>,
    /// When the record was last written.
    pub stored_at: DateTime<Utc>,
}

impl<T> CacheRecord<T> {
    /// Create a record stamped with the current time.
    pub fn new(key: CacheKey, payload: T, fingerprint: Option<String>) -> Self {
        Self::with_timestamp(key, payload, fingerprint, Utc::now())
    }

    pub fn with_timestamp(
        key: CacheKey,
        payload: T,
        fingerprint: Option<String>,
        stored_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            payload,
            fingerprint,
            stored_at,
        }
    }
}

/// Only the field pruning needs; decoding it skips the payload's type.
#[derive(Deserialize)]
struct RecordStamp {
    stored_at: DateTime<Utc>,
}

/// One namespace of a medium, bounded to `max_entries`.
#[derive(Clone)]
pub struct BoundedStore {
    medium: Arc<dyn Medium>,
    namespace: Namespace,
    max_entries: usize,
}

impl BoundedStore {
    pub fn new(medium: Arc<dyn Medium>, namespace: Namespace, max_entries: usize) -> Self {
        Self {
            medium,
            namespace,
            max_entries,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Read a record. Missing, corrupt, mismatched, or unreadable entries are `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<CacheRecord<T>> {
        let raw = match self.medium.read(&self.namespace, key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                debug!(key = %self.namespace.qualify(key), error = %err, "Cache read failed");
                return None;
            }
        };

        match serde_json::from_str::<CacheRecord<T>>(&raw) {
            Ok(record) if &record.key == key => Some(record),
            Ok(_) => {
                debug!(key = %self.namespace.qualify(key), "Cache record key mismatch");
                None
            }
            Err(err) => {
                debug!(key = %self.namespace.qualify(key), error = %err, "Corrupt cache record");
                None
            }
        }
    }

    /// Write a record, then prune the namespace. Failures are dropped.
    ///
    /// The record just written is never the one evicted unless the limit
    /// is zero.
    pub fn put<T: Serialize>(&self, record: &CacheRecord<T>) {
        if self.write(record) {
            self.prune_after_put(&record.key);
        }
    }

    /// Write a record without pruning. Returns whether the medium accepted it.
    pub fn write<T: Serialize>(&self, record: &CacheRecord<T>) -> bool {
        let json = match serde_json::to_string(record) {
            Ok(json) => json,
            Err(err) => {
                debug!(key = %self.namespace.qualify(&record.key), error = %err, "Cache record not serializable");
                return false;
            }
        };

        match self.medium.write(&self.namespace, &record.key, &json) {
            Ok(()) => true,
            Err(err) => {
                debug!(key = %self.namespace.qualify(&record.key), error = %err, "Cache write dropped");
                false
            }
        }
    }

    /// Enforce `max_entries` after writing `written`, keeping `written`.
    pub fn prune_after_put(&self, written: &CacheKey) -> usize {
        self.evict(self.max_entries, Some(written))
    }

    /// Remove the oldest entries until at most `max_entries` remain.
    ///
    /// Entries whose timestamp cannot be decoded go first. Returns the number
    /// of entries removed.
    pub fn prune(&self, max_entries: usize) -> usize {
        self.evict(max_entries, None)
    }

    /// Remove one entry.
    pub fn invalidate(&self, key: &CacheKey) {
        if let Err(err) = self.medium.remove(&self.namespace, key) {
            debug!(key = %self.namespace.qualify(key), error = %err, "Cache invalidation failed");
        }
    }

    /// Remove every entry in this namespace.
    pub fn clear(&self) -> usize {
        self.prune(0)
    }

    /// Number of entries currently in this namespace (0 if unreadable).
    pub fn len(&self) -> usize {
        self.medium
            .keys(&self.namespace)
            .map(|keys| keys.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stamp(&self, key: &CacheKey) -> Option<DateTime<Utc>> {
        let raw = self.medium.read(&self.namespace, key).ok()??;
        serde_json::from_str::<RecordStamp>(&raw)
            .ok()
            .map(|stamp| stamp.stored_at)
    }

    fn evict(&self, max_entries: usize, keep: Option<&CacheKey>) -> usize {
        let keys = match self.medium.keys(&self.namespace) {
            Ok(keys) => keys,
            Err(err) => {
                debug!(namespace = %self.namespace.prefix(), error = %err, "Cache enumeration failed");
                return 0;
            }
        };
        if keys.len() <= max_entries {
            return 0;
        }

        let excess = keys.len() - max_entries;
        // A zero limit empties the namespace, kept key included.
        let keep = keep.filter(|_| max_entries > 0);
        let mut stamped: Vec<(Option<DateTime<Utc>>, CacheKey)> = keys
            .into_iter()
            .filter(|key| Some(key) != keep)
            .map(|key| (self.stamp(&key), key))
            .collect();
        // None sorts before Some, so undecodable entries are evicted first.
        stamped.sort();

        let mut removed = 0;
        for (_, key) in stamped.into_iter().take(excess) {
            match self.medium.remove(&self.namespace, &key) {
                Ok(()) => removed += 1,
                Err(err) => {
                    debug!(key = %self.namespace.qualify(&key), error = %err, "Cache eviction failed")
                }
            }
        }

        if removed > 0 {
            info!(namespace = %self.namespace.prefix(), removed, max_entries, "Evicted cache entries");
            metrics::counter!("grove_cache_evict_total", "component" => self.namespace.component())
                .increment(removed as u64);
        }
        removed
    }
}
