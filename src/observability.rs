//! Observability hooks for entity operations.
//!
//! Implement the `CacheMetrics` trait to collect cache statistics for your
//! monitoring system:
//!
//! ```ignore
//! use entity_cache::observability::CacheMetrics;
//! use std::time::Duration;
//!
//! struct PrometheusMetrics;
//!
//! impl CacheMetrics for PrometheusMetrics {
//!     fn record_hit(&self, _key: &str, _duration: Duration) {
//!         // counter!("entity_cache_hits").inc();
//!     }
//!     // ... implement other methods
//! }
//!
//! // let service = CacheService::new(backend, config)
//! //     .with_metrics(Arc::new(PrometheusMetrics));
//! ```
//!
//! Entities created without a sink use `NoOpMetrics`. `LogMetrics` keeps the
//! default bodies, which report through the `log` crate.
//!
//! # Hooks
//!
//! - `record_hit()` - `get` found a record
//! - `record_miss()` - `get` found nothing (before any handler runs)
//! - `record_set()` - a record was written, by `set` or by a write-back
//! - `record_delete()` - `del` or `clear` removed keys
//! - `record_error()` - a store or handler failure, including absorbed ones

use std::time::Duration;

/// Trait for cache metrics collection.
pub trait CacheMetrics: Send + Sync {
    /// Record a cache hit.
    fn record_hit(&self, key: &str, duration: Duration) {
        debug!("Cache HIT: {} took {:?}", key, duration);
    }

    /// Record a cache miss.
    fn record_miss(&self, key: &str, duration: Duration) {
        debug!("Cache MISS: {} took {:?}", key, duration);
    }

    /// Record a cache set operation.
    fn record_set(&self, key: &str, duration: Duration) {
        debug!("Cache SET: {} took {:?}", key, duration);
    }

    /// Record a cache delete operation.
    fn record_delete(&self, key: &str, duration: Duration) {
        debug!("Cache DELETE: {} took {:?}", key, duration);
    }

    /// Record an error.
    fn record_error(&self, key: &str, error: &str) {
        warn!("Cache ERROR for {}: {}", key, error);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_hit(&self, _key: &str, _duration: Duration) {}
    fn record_miss(&self, _key: &str, _duration: Duration) {}
    fn record_set(&self, _key: &str, _duration: Duration) {}
    fn record_delete(&self, _key: &str, _duration: Duration) {}
    fn record_error(&self, _key: &str, _error: &str) {}
}

/// Metrics sink that only logs.
#[derive(Clone, Default)]
pub struct LogMetrics;

impl CacheMetrics for LogMetrics {}
