//! Response cache: memoizes idempotent backend reads
//!
//! Entries live for the lifetime of the process. There is no TTL and no
//! invalidation other than [`ResponseCache::clear`]: upstream changes to a
//! cached flag or segment are not observed until the cache is cleared or
//! the process restarts. An optional capacity bound evicts the oldest entry.

use crate::types::{Entity, EntityKind};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Marker used in place of an entity key for list reads
pub const LIST_MARKER: &str = "list";

/// Build the key for a single-entity read, e.g. `flag:checkout-v2`
pub fn entity_key(kind: EntityKind, key: &str) -> String {
    format!("{}:{}", kind.singular(), key)
}

/// Build the key for a list read, e.g. `flags:list`
pub fn list_key(kind: EntityKind) -> String {
    format!("{}:{}", kind.plural(), LIST_MARKER)
}

/// Value stored in the cache
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    /// Single entity
    One(Entity),
    /// Entity list
    Many(Vec<Entity>),
}

/// A stored value with its insertion time
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Cache key
    pub key: String,
    /// Stored value
    pub value: V,
    /// When the value was stored
    pub inserted_at: DateTime<Utc>,
}

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that ran the computation
    pub misses: u64,
    /// Entries currently stored
    pub entries: usize,
}

/// Read-through key/value cache
pub struct ResponseCache<V = CachedValue> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    max_entries: Option<usize>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone + Send + Sync> ResponseCache<V> {
    /// Unbounded cache
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: None,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cache that holds at most `max_entries` values
    pub fn bounded(max_entries: usize) -> Self {
        Self {
            max_entries: Some(max_entries.max(1)),
            ..Self::new()
        }
    }

    /// Return the stored value for `key`, or run `compute` and store its
    /// result if it succeeds. Errors are passed through and never stored.
    pub async fn get_or_compute<E, F, Fut>(&self, key: &str, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = %key, "Cache hit");
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key = %key, "Cache miss");

        let value = compute().await?;
        Ok(self.insert(key, value).await)
    }

    /// Look up a key without computing
    pub async fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().await;
        entries.get(key).map(|e| e.value.clone())
    }

    /// Store a value unless one is already present; returns the stored value
    async fn insert(&self, key: &str, value: V) -> V {
        let mut entries = self.entries.write().await;

        if let Some(existing) = entries.get(key) {
            return existing.value.clone();
        }

        if let Some(max) = self.max_entries {
            while entries.len() >= max {
                let oldest = entries
                    .values()
                    .min_by_key(|e| e.inserted_at)
                    .map(|e| e.key.clone());
                match oldest {
                    Some(k) => {
                        entries.remove(&k);
                        tracing::debug!(key = %k, "Cache entry evicted");
                    }
                    None => break,
                }
            }
        }

        entries.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                value: value.clone(),
                inserted_at: Utc::now(),
            },
        );
        value
    }

    /// Drop every entry
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        tracing::info!(entries = count, "Cache cleared");
    }

    /// Number of stored entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Current counters
    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len().await,
        }
    }
}

impl<V: Clone + Send + Sync> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
