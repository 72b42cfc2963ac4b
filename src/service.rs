//! High-level entity factory for applications.
//!
//! Holds the backend, the validated configuration and the metrics sink, and
//! hands out entities bound to them. This is the explicit replacement for a
//! process-wide cache singleton: build one service at startup and pass it
//! (or clones of it) to whatever needs entities.

use crate::backend::CacheBackend;
use crate::config::CacheConfig;
use crate::entity::{Entity, EntityOptions};
use crate::error::Result;
use crate::observability::{CacheMetrics, NoOpMetrics};
use std::sync::Arc;

/// Entity factory bound to one backend and one namespace.
///
/// Cloning is cheap: the backend handle is shared and the configuration and
/// metrics sink sit behind `Arc`.
///
/// # Example
///
/// ```ignore
/// use entity_cache::{backend::InMemoryBackend, CacheConfig, CacheService, EntityOptions};
///
/// let cache = CacheService::new(InMemoryBackend::new(), CacheConfig::new("app")?);
///
/// pub struct ScoreService {
///     cache: CacheService<InMemoryBackend>,
/// }
///
/// impl ScoreService {
///     pub async fn score(&self, user_id: i64) -> Result<Option<i64>> {
///         let entity = self.cache.entity(EntityOptions::new("score").with_param("userId", user_id))?;
///         Ok(entity.get_as::<i64>().await?)
///     }
/// }
/// ```
#[derive(Clone)]
pub struct CacheService<B: CacheBackend> {
    backend: B,
    config: Arc<CacheConfig>,
    metrics: Arc<dyn CacheMetrics>,
}

impl<B: CacheBackend> CacheService<B> {
    /// Create a new service over `backend`.
    pub fn new(backend: B, config: CacheConfig) -> Self {
        CacheService {
            backend,
            config: Arc::new(config),
            metrics: Arc::new(NoOpMetrics),
        }
    }

    /// Set custom metrics handler for every entity created afterwards.
    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Create an entity in this service's namespace.
    ///
    /// When the configuration disables the cache, the entity's TTL is forced
    /// to one second whatever `options` asked for.
    ///
    /// # Errors
    ///
    /// `Error::ValidationError` if `options` break the entity contract.
    pub fn entity(&self, mut options: EntityOptions) -> Result<Entity<B>> {
        options.ttl = self.config.effective_ttl(options.ttl);

        Entity::with_metrics(
            self.backend.clone(),
            self.config.namespace(),
            options,
            Arc::clone(&self.metrics),
        )
    }

    /// Get a reference to the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Verify the backend is reachable.
    ///
    /// # Errors
    ///
    /// `Error::StoreError` if the backend cannot be reached.
    pub async fn health_check(&self) -> Result<bool> {
        self.backend.health_check().await
    }
}
