//! Cache-aside entities.
//!
//! An [`Entity`] is bound to one entity id and one parameter combination, and
//! therefore to exactly one cache key. It reads through to an optional
//! [`Handler`] on a miss, writes typed values with an optional TTL, and can
//! invalidate every parameter variant of its entity id at once.
//!
//! # Example
//!
//! ```ignore
//! use entity_cache::{backend::InMemoryBackend, CacheValue, Entity, EntityOptions, Handler};
//!
//! let handler = Handler::from_fn(|params| {
//!     Ok::<_, entity_cache::Error>(params.get("userId").and_then(|v| v.as_i64()).map(CacheValue::from))
//! });
//! let entity = Entity::new(
//!     InMemoryBackend::new(),
//!     "app",
//!     EntityOptions::new("user-score").with_param("userId", 105368).with_handler(handler),
//! )?;
//!
//! let (value, value_type) = entity.get().await?;
//! ```

use crate::backend::CacheBackend;
use crate::error::{Error, Result};
use crate::key::{build_key, entity_pattern, ParamValue, Params};
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::serialization::{pack, unpack, CacheValue, Packed, Unpacked};
use futures::future::{join_all, BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

type HandlerFn = dyn Fn(Params) -> BoxFuture<'static, Result<Option<CacheValue>>> + Send + Sync;

/// Computes the canonical value of an entity on a cache miss.
///
/// Every handler is asynchronous at this interface; synchronous functions are
/// wrapped in an immediately ready future by [`Handler::from_fn`]. Returning
/// `None` means "no value": nothing is written back.
#[derive(Clone)]
pub struct Handler(Arc<HandlerFn>);

impl Handler {
    /// Wrap an asynchronous function.
    pub fn from_async<F, Fut, V, E>(f: F) -> Self
    where
        F: Fn(Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        V: Into<Option<CacheValue>> + 'static,
        E: fmt::Display + 'static,
    {
        Handler(Arc::new(move |params| {
            f(params)
                .map(|result| -> Result<Option<CacheValue>> {
                    result
                        .map(Into::into)
                        .map_err(|e| Error::HandlerError(e.to_string()))
                })
                .boxed()
        }))
    }

    /// Wrap a synchronous function.
    pub fn from_fn<F, V, E>(f: F) -> Self
    where
        F: Fn(Params) -> std::result::Result<V, E> + Send + Sync + 'static,
        V: Into<Option<CacheValue>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        Self::from_async(move |params| futures::future::ready(f(params)))
    }

    pub(crate) fn call(&self, params: Params) -> BoxFuture<'static, Result<Option<CacheValue>>> {
        (self.0)(params)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler(..)")
    }
}

/// Construction options for an [`Entity`].
///
/// ```
/// use entity_cache::EntityOptions;
/// use std::time::Duration;
///
/// let options = EntityOptions::new("user-profile")
///     .with_param("userId", 1)
///     .with_ttl(Duration::from_secs(60));
/// assert_eq!(options.entity_id, "user-profile");
/// ```
#[derive(Clone, Debug, Default)]
pub struct EntityOptions {
    pub entity_id: String,
    pub params: Params,
    /// Whole seconds; `None` or zero means the record never expires.
    pub ttl: Option<Duration>,
    pub handler: Option<Handler>,
}

impl EntityOptions {
    pub fn new(entity_id: impl Into<String>) -> Self {
        EntityOptions {
            entity_id: entity_id.into(),
            ..Default::default()
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name, value);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_handler(mut self, handler: Handler) -> Self {
        self.handler = Some(handler);
        self
    }
}

/// One cacheable parameter variant of an entity id.
///
/// The backend handle is shared: clones of `B` talk to the same store, and
/// the entity never owns the store's lifetime.
#[derive(Clone)]
pub struct Entity<B: CacheBackend> {
    entity_id: String,
    params: Params,
    ttl: u64,
    handler: Option<Handler>,
    key: String,
    entity_pattern: String,
    backend: B,
    metrics: Arc<dyn CacheMetrics>,
}

impl<B: CacheBackend> Entity<B> {
    /// Create an entity under `namespace`.
    ///
    /// # Errors
    ///
    /// `Error::ValidationError` when the entity id or namespace is blank, or
    /// the TTL is not a whole number of seconds.
    pub fn new(backend: B, namespace: &str, options: EntityOptions) -> Result<Self> {
        Self::with_metrics(backend, namespace, options, Arc::new(NoOpMetrics))
    }

    /// Create an entity that reports to `metrics`.
    ///
    /// # Errors
    ///
    /// Same as [`Entity::new`].
    pub fn with_metrics(
        backend: B,
        namespace: &str,
        options: EntityOptions,
        metrics: Arc<dyn CacheMetrics>,
    ) -> Result<Self> {
        let EntityOptions {
            entity_id,
            params,
            ttl,
            handler,
        } = options;

        if entity_id.trim().is_empty() {
            return Err(Error::ValidationError(
                "entity id must be a non-empty string".to_string(),
            ));
        }
        if namespace.trim().is_empty() {
            return Err(Error::ValidationError(
                "namespace must be a non-empty string".to_string(),
            ));
        }

        let ttl = match ttl {
            None => 0,
            Some(d) if d.subsec_nanos() == 0 => d.as_secs(),
            Some(d) => {
                return Err(Error::ValidationError(format!(
                    "ttl must be a whole number of seconds, got {:?}",
                    d
                )))
            }
        };

        let key = build_key(&entity_id, namespace, &params);
        let pattern = entity_pattern(namespace, &entity_id);
        debug!("entity {}: key {}", entity_id, key);

        Ok(Entity {
            entity_id,
            params,
            ttl,
            handler,
            key,
            entity_pattern: pattern,
            backend,
            metrics,
        })
    }

    /// Read the value, computing it through the handler on a miss.
    ///
    /// - Hit: the stored record, decoded.
    /// - Miss with a handler: the handler's value, typed exactly as `set`
    ///   would store it. Within a tokio runtime the write-back runs on a
    ///   detached task; elsewhere it is awaited before returning. Either way
    ///   its failure never fails this call. A handler answering `None` is
    ///   not written back.
    /// - Miss without a handler: `(None, None)`.
    ///
    /// # Errors
    ///
    /// - `Error::StoreError`: the read failed
    /// - `Error::HandlerError`: the handler failed
    /// - `Error::DeserializationError`: the stored record is malformed
    pub async fn get(&self) -> Result<Unpacked> {
        let timer = Instant::now();

        let record = self
            .backend
            .hget_all(&self.key)
            .await
            .map_err(|e| self.report(e))?;

        if record.is_some() {
            debug!("get({}): hit", self.key);
            self.metrics.record_hit(&self.key, timer.elapsed());
            return unpack(record.as_ref());
        }

        self.metrics.record_miss(&self.key, timer.elapsed());

        let Some(handler) = &self.handler else {
            debug!("get({}): miss, no handler", self.key);
            return unpack(None);
        };

        debug!("get({}): miss, computing value from handler", self.key);
        let computed = handler
            .call(self.params.clone())
            .await
            .map_err(|e| self.report(e))?;

        let Some(value) = computed else {
            debug!("get({}): handler produced no value, nothing written", self.key);
            return Ok((None, None));
        };

        let packed = pack(&value)?;
        let result = packed.unpack()?;
        self.write_back(packed).await;
        Ok(result)
    }

    /// Write `value`, then apply the TTL if one is configured.
    ///
    /// A failure to apply the TTL is logged and does not fail the call.
    ///
    /// # Errors
    ///
    /// `Error::StoreError` if the write itself fails.
    pub async fn set(&self, value: impl Into<CacheValue>) -> Result<bool> {
        let timer = Instant::now();
        let packed = pack(&value.into())?;

        let written = write_record(&self.backend, &self.key, self.ttl, &packed)
            .await
            .map_err(|e| self.report(e))?;

        self.metrics.record_set(&self.key, timer.elapsed());
        Ok(written)
    }

    /// Delete this variant's record. Returns whether a record was removed.
    ///
    /// # Errors
    ///
    /// `Error::StoreError` if the delete fails.
    pub async fn del(&self) -> Result<bool> {
        let timer = Instant::now();

        let removed = self
            .backend
            .delete(&self.key)
            .await
            .map_err(|e| self.report(e))?;

        debug!("del({}): removed={}", self.key, removed);
        self.metrics.record_delete(&self.key, timer.elapsed());
        Ok(removed)
    }

    /// Delete every cached variant of this entity id, whatever its params.
    ///
    /// Deletions run concurrently and are all awaited before reporting. An
    /// empty match set counts as success.
    ///
    /// # Errors
    ///
    /// `Error::StoreError` if enumeration fails, or the first failed deletion
    /// once all of them have finished.
    pub async fn clear(&self) -> Result<bool> {
        let timer = Instant::now();

        let keys = self
            .backend
            .keys(&self.entity_pattern)
            .await
            .map_err(|e| self.report(e))?;

        let results = join_all(keys.iter().map(|key| self.backend.delete(key))).await;
        let removed = results.iter().filter(|r| matches!(r, Ok(true))).count();

        if let Some(e) = results.into_iter().find_map(|r| r.err()) {
            return Err(self.report(e));
        }

        debug!(
            "clear({}): removed {} of {} keys",
            self.entity_pattern,
            removed,
            keys.len()
        );
        self.metrics.record_delete(&self.entity_pattern, timer.elapsed());
        Ok(true)
    }

    /// [`get`](Entity::get), deserialized into `T`.
    ///
    /// # Errors
    ///
    /// Same as `get`, plus `Error::DeserializationError` when the value does
    /// not fit `T`.
    pub async fn get_as<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        let (value, _) = self.get().await?;
        value.map(|v| v.deserialize_into()).transpose()
    }

    /// [`set`](Entity::set) for any serializable value.
    ///
    /// # Errors
    ///
    /// Same as `set`, plus `Error::SerializationError`.
    pub async fn set_as<T: Serialize + ?Sized>(&self, value: &T) -> Result<bool> {
        self.set(CacheValue::from_serializable(value)?).await
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// TTL in seconds; 0 means no expiration.
    pub fn ttl(&self) -> u64 {
        self.ttl
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn entity_pattern(&self) -> &str {
        &self.entity_pattern
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    fn report(&self, e: Error) -> Error {
        self.metrics.record_error(&self.key, &e.to_string());
        e
    }

    /// Persist a handler's value without ever failing the caller.
    ///
    /// Inside a tokio runtime the write runs on a detached task. Under any
    /// other executor it is awaited in place, with its failure absorbed the
    /// same way.
    async fn write_back(&self, packed: Packed) {
        let task = write_back_task(
            self.backend.clone(),
            self.key.clone(),
            self.ttl,
            packed,
            Arc::clone(&self.metrics),
        );

        match tokio::runtime::Handle::try_current().ok() {
            Some(runtime) => {
                runtime.spawn(task);
            }
            None => {
                debug!("get({}): no tokio runtime, writing back inline", self.key);
                task.await;
            }
        }
    }
}

impl<B: CacheBackend> fmt::Debug for Entity<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("key", &self.key)
            .field("ttl", &self.ttl)
            .field("handler", &self.handler)
            .finish()
    }
}

async fn write_back_task<B: CacheBackend>(
    backend: B,
    key: String,
    ttl: u64,
    packed: Packed,
    metrics: Arc<dyn CacheMetrics>,
) {
    let timer = Instant::now();
    match write_record(&backend, &key, ttl, &packed).await {
        Ok(_) => metrics.record_set(&key, timer.elapsed()),
        Err(e) => {
            warn!("write-back for {} failed: {}", key, e);
            metrics.record_error(&key, &e.to_string());
        }
    }
}

/// Write both fields, then the TTL. Only the write's failure is returned.
async fn write_record<B: CacheBackend>(
    backend: &B,
    key: &str,
    ttl: u64,
    packed: &Packed,
) -> Result<bool> {
    let written = backend.hset(key, &packed.fields()).await?;

    if written && ttl > 0 {
        match backend.expire(key, ttl).await {
            Ok(true) => debug!("set({}): ttl {}s applied", key, ttl),
            Ok(false) => warn!("set({}): ttl not applied, key vanished before EXPIRE", key),
            Err(e) => warn!("set({}): failed to apply ttl {}s: {}", key, ttl, e),
        }
    }

    Ok(written)
}
