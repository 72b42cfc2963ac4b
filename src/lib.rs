//! # entity-cache
//!
//! Typed cache-aside entities over a key-value store.
//!
//! ## Features
//!
//! - **Deterministic keys:** `namespace:entity:name=value,...`, params sorted by name
//! - **Typed records:** objects, strings, numbers and booleans round-trip with their type
//! - **Read-through handlers:** a miss computes the value and writes it back in the background
//! - **TTL:** per-entity expiration, or a global "disable cache" switch forcing 1 second
//! - **Bulk invalidation:** `clear()` drops every parameter variant of an entity id
//! - **Backend Agnostic:** in-memory (default) and Redis, or any `CacheBackend`
//!
//! ## Quick Start
//!
//! ```ignore
//! use entity_cache::{
//!     backend::InMemoryBackend, CacheConfig, CacheService, CacheValue, EntityOptions, Handler,
//! };
//! use std::time::Duration;
//!
//! // 1. Build the service once at startup
//! let cache = CacheService::new(InMemoryBackend::new(), CacheConfig::new("app")?);
//!
//! // 2. Describe how to compute a value on a miss
//! let handler = Handler::from_async(|params| async move {
//!     let user_id = params.get("userId").and_then(|v| v.as_i64());
//!     Ok::<_, entity_cache::Error>(user_id.map(|id| CacheValue::from(id * 10)))
//! });
//!
//! // 3. Bind an entity to one parameter combination
//! let entity = cache.entity(
//!     EntityOptions::new("user-score")
//!         .with_param("userId", 105368)
//!         .with_ttl(Duration::from_secs(300))
//!         .with_handler(handler),
//! )?;
//!
//! // 4. Read through the cache
//! let (value, value_type) = entity.get().await?;
//!
//! // 5. Invalidate every userId variant
//! entity.clear().await?;
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod config;
pub mod entity;
pub mod error;
pub mod key;
pub mod observability;
pub mod serialization;
pub mod service;

// Re-exports for convenience
pub use backend::CacheBackend;
pub use config::CacheConfig;
pub use entity::{Entity, EntityOptions, Handler};
pub use error::{Error, Result};
pub use key::{ParamValue, Params};
pub use serialization::{CacheValue, ValueType};
pub use service::CacheService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
