// TTL cache over an injected key-value storage capability.
// The cache is strictly an optimization: a broken storage behaves like an
// empty one, and no storage fault ever reaches the caller.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

// Fixed namespace tag so cache entries never collide with unrelated keys
// in the same storage.
pub const CACHE_PREFIX: &str = "assistlink_cache_";

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage read error: {0}")]
    Read(String),

    #[error("Storage write error: {0}")]
    Write(String),
}

// Storage capability the cache is built on. The app supplies the device
// store; tests supply MemoryStorage or a deliberately broken one.
#[async_trait]
pub trait KeyValueStorage: Send + Sync + 'static {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;
    async fn keys(&self) -> Result<Vec<String>, StorageError>;
}

#[derive(Default)]
pub struct MemoryStorage {
    items: DashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStorage for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.get(key).map(|v| v.value().clone()))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.items.iter().map(|e| e.key().clone()).collect())
    }
}

#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    pub hit_count: usize,
    pub miss_count: usize,
    pub expired_count: usize,
    pub write_error_count: usize,
}

// An entry is valid iff now < expires_at. Expired entries are removed on
// read and are indistinguishable from absence.
#[derive(Serialize, Deserialize)]
struct CacheEntry<T> {
    data: T,
    expires_at: i64,
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

// Deterministic key for (resource, params). Params are sorted by name so
// the key does not depend on iteration order. An empty param set adds
// nothing to the key.
pub fn cache_key(resource: &str, params: &[(&str, &str)]) -> String {
    let mut key = format!("{}{}", CACHE_PREFIX, sanitize(resource));
    if !params.is_empty() {
        let mut sorted: Vec<(&str, &str)> = params.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let query = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", sanitize(k), sanitize(v)))
            .collect::<Vec<_>>()
            .join("&");
        key.push('_');
        key.push_str(&query);
    }
    key
}

pub struct CacheStore {
    storage: Arc<dyn KeyValueStorage>,
    stats: RwLock<CacheStats>,
}

impl CacheStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            storage,
            stats: RwLock::new(CacheStats::default()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    // Returns the cached value, or None on miss, expiry or any storage
    // fault. Expired entries are deleted as a side effect.
    pub async fn get<T: DeserializeOwned>(&self, resource: &str, params: &[(&str, &str)]) -> Option<T> {
        let key = cache_key(resource, params);

        let raw = match self.storage.get_item(&key).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "cache read failed, treating as miss");
                self.stats.write().miss_count += 1;
                return None;
            }
        };

        let Some(text) = raw else {
            self.stats.write().miss_count += 1;
            return None;
        };

        let entry: CacheEntry<T> = match serde_json::from_str(&text) {
            Ok(entry) => entry,
            Err(e) => {
                // Corrupt entry: drop it and report a miss.
                warn!(key = %key, error = %e, "corrupt cache entry removed");
                let _ = self.storage.remove_item(&key).await;
                self.stats.write().miss_count += 1;
                return None;
            }
        };

        if Utc::now().timestamp_millis() >= entry.expires_at {
            let _ = self.storage.remove_item(&key).await;
            let mut stats = self.stats.write();
            stats.expired_count += 1;
            stats.miss_count += 1;
            return None;
        }

        self.stats.write().hit_count += 1;
        Some(entry.data)
    }

    // Always succeeds from the caller's point of view; a failed write is
    // logged and swallowed. A write fully replaces any prior entry for the
    // same key.
    pub async fn set<T: Serialize>(
        &self,
        resource: &str,
        data: &T,
        params: &[(&str, &str)],
        ttl: Option<Duration>,
    ) {
        let key = cache_key(resource, params);
        let ttl = ttl.unwrap_or(DEFAULT_TTL);
        let entry = CacheEntry {
            data,
            expires_at: Utc::now().timestamp_millis() + ttl.as_millis() as i64,
        };

        let text = match serde_json::to_string(&entry) {
            Ok(text) => text,
            Err(e) => {
                warn!(key = %key, error = %e, "failed to serialize cache entry");
                self.stats.write().write_error_count += 1;
                return;
            }
        };

        if let Err(e) = self.storage.set_item(&key, &text).await {
            warn!(key = %key, error = %e, "cache write failed");
            self.stats.write().write_error_count += 1;
        }
    }

    // Removes every entry in this cache's namespace, or only the entries
    // whose resource/query part contains `pattern`.
    pub async fn invalidate(&self, pattern: Option<&str>) {
        let keys = match self.storage.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "cache invalidation skipped, storage unreadable");
                return;
            }
        };

        let pattern = pattern.map(sanitize);
        let mut removed = 0usize;
        for key in keys {
            let Some(rest) = key.strip_prefix(CACHE_PREFIX) else {
                continue;
            };
            let matches = match &pattern {
                Some(p) => rest.contains(p.as_str()),
                None => true,
            };
            if matches {
                let _ = self.storage.remove_item(&key).await;
                removed += 1;
            }
        }
        debug!(removed, pattern = ?pattern, "cache invalidated");
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.read().clone()
    }
}
