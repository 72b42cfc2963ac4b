//! Cache backend implementations.

use crate::error::Result;
use crate::serialization::FieldSet;
use std::future::Future;

pub mod inmemory;
#[cfg(feature = "redis")]
pub mod redis;

pub use inmemory::InMemoryBackend;
#[cfg(feature = "redis")]
pub use redis::{PoolStats, RedisBackend, RedisConfig};

/// Capability interface over the key-value store.
///
/// Entities only ever need these operations; any adapter that provides them
/// can back an entity. Implementations: InMemory (default), Redis.
///
/// **IMPORTANT:** All methods use `&self` instead of `&mut self` to allow concurrent access.
/// Backend implementations should use interior mutability or external storage.
/// Clones must share the same underlying store.
///
/// **ASYNC:** Every returned future is `Send`, because a cache miss hands the
/// write-back to a detached tokio task. Implementations may still be written
/// with `async fn`.
pub trait CacheBackend: Send + Sync + Clone + 'static {
    /// Read every field stored under `key`.
    ///
    /// # Returns
    /// - `Ok(Some(fields))` - Record found
    /// - `Ok(None)` - No record under this key
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs (connection lost, etc.)
    fn hget_all(&self, key: &str) -> impl Future<Output = Result<Option<FieldSet>>> + Send;

    /// Write `fields` under `key` in a single command.
    ///
    /// Existing fields not named in `fields` are kept; an existing expiration is kept.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    fn hset(
        &self,
        key: &str,
        fields: &[(&str, String)],
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Expire `key` after `seconds`.
    ///
    /// Returns `false` when there is no such key.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    fn expire(&self, key: &str, seconds: u64) -> impl Future<Output = Result<bool>> + Send;

    /// Remove `key`. Returns whether a record was removed.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    fn delete(&self, key: &str) -> impl Future<Output = Result<bool>> + Send;

    /// List keys matching a Redis-style glob pattern.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    fn keys(&self, pattern: &str) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Remaining time to live of `key`, in whole seconds.
    ///
    /// `None` when the key does not exist or carries no expiration.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    fn ttl(&self, key: &str) -> impl Future<Output = Result<Option<u64>>> + Send;

    /// Health check - verify backend is accessible.
    ///
    /// # Errors
    /// Returns `Err` if backend is not accessible
    fn health_check(&self) -> impl Future<Output = Result<bool>> + Send {
        async { Ok(true) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_backend_health_check_default() {
        let backend = InMemoryBackend::new();
        assert!(backend
            .health_check()
            .await
            .expect("Failed to check health"));
    }

    #[tokio::test]
    async fn test_backend_usable_through_generic() {
        async fn round_trip<B: CacheBackend>(backend: &B) -> Option<FieldSet> {
            backend
                .hset("generic", &[("type", "1".to_string())])
                .await
                .expect("Failed to hset");
            backend.hget_all("generic").await.expect("Failed to hget_all")
        }

        let backend = InMemoryBackend::new();
        let fields = round_trip(&backend).await.expect("Record missing");
        assert_eq!(fields.get("type").map(String::as_str), Some("1"));
    }
}
