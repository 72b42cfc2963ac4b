//! In-process store of field maps (the default backend).
//!
//! Records live in a sharded `DashMap`. Expired records are dropped lazily,
//! when a read or TTL query touches them; key scans skip them.

use super::CacheBackend;
use crate::error::Result;
use crate::key::glob_match;
use crate::serialization::FieldSet;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// In-memory record with optional expiration.
struct CacheEntry {
    fields: FieldSet,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }
}

/// Thread-safe async in-memory cache backend.
///
/// Stores hash records the way Redis does: `hset` merges fields into the
/// existing record and leaves its expiration alone, `expire` attaches a
/// deadline, and `keys` matches globs against every live key.
///
/// # Example
///
/// ```no_run
/// use entity_cache::backend::{InMemoryBackend, CacheBackend};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = InMemoryBackend::new();
///
///     backend.hset("app:user:id=1", &[("type", "1".to_string()), ("value", "Alice".to_string())]).await?;
///     backend.expire("app:user:id=1", 300).await?;
///
///     let record = backend.hget_all("app:user:id=1").await?;
///     assert!(record.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct InMemoryBackend {
    store: Arc<DashMap<String, CacheEntry>>,
}

impl InMemoryBackend {
    /// Create a new in-memory cache backend.
    pub fn new() -> Self {
        InMemoryBackend {
            store: Arc::new(DashMap::new()),
        }
    }

    /// Get the current number of entries in cache (expired ones included until touched).
    pub async fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Drop every record.
    pub async fn flush(&self) {
        self.store.clear();
        warn!("⚠ InMemory FLUSH executed - all cache cleared!");
    }

    /// Get memory statistics.
    pub async fn stats(&self) -> CacheStats {
        let total_bytes: usize = self
            .store
            .iter()
            .map(|entry| {
                entry
                    .fields
                    .iter()
                    .map(|(name, value)| name.len() + value.len())
                    .sum::<usize>()
            })
            .sum();
        let expired_count = self.store.iter().filter(|entry| entry.is_expired()).count();

        CacheStats {
            total_entries: self.store.len(),
            expired_entries: expired_count,
            total_bytes,
        }
    }

    /// Print cache statistics to debug log.
    pub async fn log_stats(&self) {
        let stats = self.stats().await;
        debug!(
            "Cache Stats: {} entries ({} expired), {} bytes",
            stats.total_entries, stats.expired_entries, stats.total_bytes
        );
    }

    /// Remove `key` if its deadline has passed. Returns whether it is still live.
    fn evict_if_expired(&self, key: &str) -> bool {
        let expired = match self.store.get(key) {
            Some(entry) => entry.is_expired(),
            None => return false,
        };
        if expired {
            self.store.remove(key);
        }
        !expired
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheBackend for InMemoryBackend {
    async fn hget_all(&self, key: &str) -> Result<Option<FieldSet>> {
        if self.evict_if_expired(key) {
            if let Some(entry) = self.store.get(key) {
                debug!("✓ InMemory HGETALL {} -> HIT", key);
                return Ok(Some(entry.fields.clone()));
            }
        }

        debug!("✓ InMemory HGETALL {} -> MISS", key);
        Ok(None)
    }

    async fn hset(&self, key: &str, fields: &[(&str, String)]) -> Result<bool> {
        self.evict_if_expired(key);

        let mut entry = self.store.entry(key.to_string()).or_insert_with(|| CacheEntry {
            fields: FieldSet::new(),
            expires_at: None,
        });
        for (name, value) in fields {
            entry.fields.insert((*name).to_string(), value.clone());
        }

        debug!("✓ InMemory HSET {} ({} fields)", key, fields.len());
        Ok(true)
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
        if !self.evict_if_expired(key) {
            return Ok(false);
        }

        if seconds == 0 {
            self.store.remove(key);
            debug!("✓ InMemory EXPIRE {} 0 -> removed", key);
            return Ok(true);
        }

        match self.store.get_mut(key) {
            Some(mut entry) => {
                entry.expires_at = Some(Instant::now() + Duration::from_secs(seconds));
                debug!("✓ InMemory EXPIRE {} {}s", key, seconds);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let live = self.evict_if_expired(key);
        let removed = live && self.store.remove(key).is_some();
        debug!("✓ InMemory DELETE {} -> {}", key, removed);
        Ok(removed)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let keys: Vec<String> = self
            .store
            .iter()
            .filter(|entry| !entry.is_expired() && glob_match(pattern, entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        debug!("✓ InMemory KEYS {} -> {} keys", pattern, keys.len());
        Ok(keys)
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>> {
        if !self.evict_if_expired(key) {
            return Ok(None);
        }

        Ok(self.store.get(key).and_then(|entry| {
            entry.expires_at.map(|exp| {
                let remaining = exp.saturating_duration_since(Instant::now());
                // Sub-second remainders round up.
                remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
            })
        }))
    }

    async fn health_check(&self) -> Result<bool> {
        // In-memory backend is always healthy
        Ok(true)
    }
}

/// Cache statistics.
#[derive(Clone, Debug)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub total_bytes: usize,
}
