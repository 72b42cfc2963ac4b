//! Integration tests for entity-cache
//!
//! These tests verify end-to-end entity behavior through the public API,
//! using the in-memory backend.

use entity_cache::backend::{CacheBackend, InMemoryBackend};
use entity_cache::serialization::FieldSet;
use entity_cache::{
    CacheConfig, CacheService, CacheValue, Error, EntityOptions, Handler, Params, Result,
    ValueType,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const NAMESPACE: &str = "entity-cache-test";
const ENTITY_ID: &str = "test-entity";

fn cache() -> CacheService<InMemoryBackend> {
    let _ = env_logger::builder().is_test(true).try_init();

    CacheService::new(
        InMemoryBackend::new(),
        CacheConfig::new(NAMESPACE).expect("valid config"),
    )
}

fn user_id(params: &Params) -> i64 {
    params
        .get("userId")
        .and_then(|v| v.as_i64())
        .expect("userId param")
}

/// Give detached write-backs a chance to run.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct User {
    id: i64,
    name: String,
    email: String,
}

/// Store whose reads work but whose writes always fail.
#[derive(Clone, Default)]
struct ReadOnlyBackend {
    inner: InMemoryBackend,
    write_attempts: Arc<AtomicUsize>,
}

impl CacheBackend for ReadOnlyBackend {
    async fn hget_all(&self, key: &str) -> Result<Option<FieldSet>> {
        self.inner.hget_all(key).await
    }

    async fn hset(&self, _key: &str, _fields: &[(&str, String)]) -> Result<bool> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        Err(Error::StoreError("READONLY replica".to_string()))
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
        self.inner.expire(key, seconds).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.inner.delete(key).await
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.inner.keys(pattern).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>> {
        self.inner.ttl(key).await
    }
}

/// Store that is down.
#[derive(Clone, Default)]
struct DownBackend;

impl CacheBackend for DownBackend {
    async fn hget_all(&self, _key: &str) -> Result<Option<FieldSet>> {
        Err(Error::StoreError("connection refused".to_string()))
    }

    async fn hset(&self, _key: &str, _fields: &[(&str, String)]) -> Result<bool> {
        Err(Error::StoreError("connection refused".to_string()))
    }

    async fn expire(&self, _key: &str, _seconds: u64) -> Result<bool> {
        Err(Error::StoreError("connection refused".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<bool> {
        Err(Error::StoreError("connection refused".to_string()))
    }

    async fn keys(&self, _pattern: &str) -> Result<Vec<String>> {
        Err(Error::StoreError("connection refused".to_string()))
    }

    async fn ttl(&self, _key: &str) -> Result<Option<u64>> {
        Err(Error::StoreError("connection refused".to_string()))
    }

    async fn health_check(&self) -> Result<bool> {
        Err(Error::StoreError("connection refused".to_string()))
    }
}

/// Test 1: Entity construction contracts
#[test]
fn test_entity_construction_validation() {
    let cache = cache();

    assert!(matches!(
        cache.entity(EntityOptions::new("")),
        Err(Error::ValidationError(_))
    ));
    assert!(matches!(
        cache.entity(EntityOptions::new(ENTITY_ID).with_ttl(Duration::from_millis(10))),
        Err(Error::ValidationError(_))
    ));

    let handler = Handler::from_fn(|params: Params| Ok::<_, Error>(CacheValue::from(user_id(&params))));
    let entity = cache
        .entity(EntityOptions::new("entityId").with_handler(handler))
        .expect("valid entity");
    assert!(entity.has_handler());
}

/// Test 2: Miss without handler yields the absent sentinel
#[tokio::test]
async fn test_get_without_handler_returns_absent() {
    let entity = cache()
        .entity(EntityOptions::new(ENTITY_ID))
        .expect("valid entity");

    let (value, value_type) = entity.get().await.expect("get should succeed");
    assert_eq!(value, None);
    assert_eq!(value_type, None);
}

/// Test 3: Read-through with a handler
///
/// - Miss → handler result returned with its type
/// - Record persisted for the entity's key
/// - Second read is a hit
#[tokio::test]
async fn test_get_with_handler_populates_cache() {
    let cache = cache();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let handler = Handler::from_fn(move |params: Params| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok::<_, Error>(CacheValue::from(user_id(&params)))
    });

    let entity = cache
        .entity(
            EntityOptions::new(ENTITY_ID)
                .with_param("userId", 105368)
                .with_handler(handler),
        )
        .expect("valid entity");
    entity.clear().await.expect("clear should succeed");

    let (value, value_type) = entity.get().await.expect("get should succeed");
    assert_eq!(value, Some(CacheValue::Number(105368)));
    assert_eq!(value_type, Some(ValueType::Number));

    settle().await;
    let stored = cache
        .backend()
        .hget_all(entity.key())
        .await
        .expect("direct read should succeed")
        .expect("record should be persisted");
    assert_eq!(stored.get("type").map(String::as_str), Some("2"));
    assert_eq!(stored.get("value").map(String::as_str), Some("105368"));

    let (again, _) = entity.get().await.expect("get should succeed");
    assert_eq!(again, Some(CacheValue::Number(105368)));
    assert_eq!(calls.load(Ordering::SeqCst), 1, "handler runs once");
}

/// Test 4: Handler results keep their type (string, boolean, object, async)
#[tokio::test]
async fn test_handler_result_types() {
    let cache = cache();

    let as_string = cache
        .entity(
            EntityOptions::new(ENTITY_ID)
                .with_param("userId", 105369)
                .with_handler(Handler::from_fn(|params: Params| {
                    Ok::<_, Error>(CacheValue::from(user_id(&params).to_string()))
                })),
        )
        .unwrap();
    as_string.clear().await.unwrap();
    assert_eq!(
        as_string.get().await.unwrap(),
        (Some(CacheValue::from("105369")), Some(ValueType::String))
    );

    let as_bool = cache
        .entity(
            EntityOptions::new(ENTITY_ID)
                .with_param("userId", 105370)
                .with_handler(Handler::from_fn(|params: Params| {
                    Ok::<_, Error>(CacheValue::from(user_id(&params) != 0))
                })),
        )
        .unwrap();
    as_bool.clear().await.unwrap();
    assert_eq!(
        as_bool.get().await.unwrap(),
        (Some(CacheValue::Boolean(true)), Some(ValueType::Boolean))
    );

    let as_object = cache
        .entity(
            EntityOptions::new(ENTITY_ID)
                .with_param("userId", 105370)
                .with_handler(Handler::from_fn(|params: Params| {
                    Ok::<_, Error>(CacheValue::from(params.to_json()))
                })),
        )
        .unwrap();
    as_object.clear().await.unwrap();
    assert_eq!(
        as_object.get().await.unwrap(),
        (
            Some(CacheValue::Object(serde_json::json!({ "userId": 105370 }))),
            Some(ValueType::Object)
        )
    );

    let async_bool = cache
        .entity(
            EntityOptions::new(ENTITY_ID)
                .with_param("userId", 105370)
                .with_handler(Handler::from_async(|params: Params| async move {
                    tokio::task::yield_now().await;
                    Ok::<_, Error>(CacheValue::from(user_id(&params) != 0))
                })),
        )
        .unwrap();
    async_bool.clear().await.unwrap();
    assert_eq!(
        async_bool.get().await.unwrap(),
        (Some(CacheValue::Boolean(true)), Some(ValueType::Boolean))
    );
}

/// Test 5: set then get
#[tokio::test]
async fn test_set_then_get() {
    let entity = cache().entity(EntityOptions::new(ENTITY_ID)).unwrap();

    assert!(entity.set(1234).await.expect("set should succeed"));

    let (value, value_type) = entity.get().await.expect("get should succeed");
    assert_eq!(value, Some(CacheValue::Number(1234)));
    assert_eq!(value_type, Some(ValueType::Number));
}

/// Test 6: set, del, get
#[tokio::test]
async fn test_del_removes_record() {
    let entity = cache().entity(EntityOptions::new(ENTITY_ID)).unwrap();

    entity.set(1234).await.unwrap();
    assert_eq!(entity.get().await.unwrap().0, Some(CacheValue::Number(1234)));

    assert!(entity.del().await.expect("del should succeed"));
    assert_eq!(entity.get().await.unwrap(), (None, None));
}

/// Test 7: clear drops every params variant
#[tokio::test]
async fn test_clear_drops_all_variants() {
    let cache = cache();
    let first = cache
        .entity(EntityOptions::new(ENTITY_ID).with_param("userId", 1))
        .unwrap();
    let second = cache
        .entity(EntityOptions::new(ENTITY_ID).with_param("userId", 2))
        .unwrap();
    let bare = cache.entity(EntityOptions::new(ENTITY_ID)).unwrap();

    assert_ne!(first.key(), second.key());
    first.set(1).await.unwrap();
    second.set(2).await.unwrap();
    bare.set(3).await.unwrap();
    assert_eq!(cache.backend().len().await, 3);

    assert!(bare.clear().await.expect("clear should succeed"));

    assert_eq!(first.get().await.unwrap(), (None, None));
    assert_eq!(second.get().await.unwrap(), (None, None));
    assert!(cache.backend().is_empty().await);
}

/// Test 8: TTL handling
#[tokio::test]
async fn test_ttl_applied_only_when_positive() {
    let cache = cache();
    let expiring = cache
        .entity(EntityOptions::new("expiring").with_ttl(Duration::from_secs(5)))
        .unwrap();
    let permanent = cache
        .entity(EntityOptions::new("permanent").with_ttl(Duration::ZERO))
        .unwrap();

    expiring.set("soon gone").await.unwrap();
    permanent.set("here to stay").await.unwrap();

    assert_eq!(cache.backend().ttl(expiring.key()).await.unwrap(), Some(5));
    assert_eq!(cache.backend().ttl(permanent.key()).await.unwrap(), None);
}

/// Test 9: TTL expiration end to end
#[tokio::test]
async fn test_ttl_expiration() {
    let entity = cache()
        .entity(EntityOptions::new("short-lived").with_ttl(Duration::from_secs(1)))
        .unwrap();

    entity.set(true).await.unwrap();
    assert_eq!(entity.get().await.unwrap().0, Some(CacheValue::Boolean(true)));

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(entity.get().await.unwrap(), (None, None));
}

/// Test 10: Disabled cache forces a one second TTL
#[tokio::test]
async fn test_disabled_cache_expires_quickly() {
    let backend = InMemoryBackend::new();
    let config = CacheConfig::new(NAMESPACE)
        .unwrap()
        .with_disable_cache(true);
    let cache = CacheService::new(backend.clone(), config);

    let entity = cache
        .entity(EntityOptions::new("disabled").with_ttl(Duration::from_secs(3600)))
        .unwrap();
    entity.set(1).await.unwrap();

    assert_eq!(backend.ttl(entity.key()).await.unwrap(), Some(1));
}

/// Test 11: The opportunistic write-back never fails a read
#[tokio::test]
async fn test_write_back_failure_does_not_fail_get() {
    let backend = ReadOnlyBackend::default();
    let cache = CacheService::new(backend.clone(), CacheConfig::new(NAMESPACE).unwrap());
    let entity = cache
        .entity(
            EntityOptions::new(ENTITY_ID)
                .with_param("userId", 42)
                .with_handler(Handler::from_fn(|params: Params| {
                    Ok::<_, Error>(CacheValue::from(user_id(&params)))
                })),
        )
        .unwrap();

    let (value, _) = entity.get().await.expect("get must not fail");
    assert_eq!(value, Some(CacheValue::Number(42)));

    settle().await;
    assert_eq!(backend.write_attempts.load(Ordering::SeqCst), 1);

    // A direct set does surface the failure.
    assert!(entity.set(1).await.unwrap_err().is_store_error());
}

/// Test 12: Store and handler failures propagate
#[tokio::test]
async fn test_failures_propagate() {
    let down = CacheService::new(DownBackend, CacheConfig::new(NAMESPACE).unwrap());
    let entity = down.entity(EntityOptions::new(ENTITY_ID)).unwrap();

    assert!(entity.get().await.unwrap_err().is_store_error());
    assert!(entity.set(1).await.unwrap_err().is_store_error());
    assert!(entity.del().await.unwrap_err().is_store_error());
    assert!(entity.clear().await.unwrap_err().is_store_error());
    assert!(down.health_check().await.is_err());

    let failed = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&failed);
    let entity = cache()
        .entity(
            EntityOptions::new(ENTITY_ID).with_handler(Handler::from_async(
                move |_params: Params| {
                    let flag = Arc::clone(&flag);
                    async move {
                        flag.store(true, Ordering::SeqCst);
                        Err::<CacheValue, _>(Error::Other("database offline".to_string()))
                    }
                },
            )),
        )
        .unwrap();

    let err = entity.get().await.unwrap_err();
    assert!(matches!(err, Error::HandlerError(_)));
    assert!(failed.load(Ordering::SeqCst));
}

/// Test 13: Typed values through serde
#[tokio::test]
async fn test_typed_entity_values() {
    let cache = cache();
    let entity = cache
        .entity(
            EntityOptions::new("user")
                .with_param("id", 7)
                .with_handler(Handler::from_async(|params: Params| async move {
                    let id = params.get("id").and_then(|v| v.as_i64()).unwrap_or_default();
                    let user = User {
                        id,
                        name: "Alice".to_string(),
                        email: "alice@example.com".to_string(),
                    };
                    CacheValue::from_serializable(&user).map(Some)
                })),
        )
        .unwrap();

    let user: User = entity
        .get_as()
        .await
        .expect("get_as should succeed")
        .expect("handler provides a user");
    assert_eq!(user.id, 7);
    assert_eq!(user.name, "Alice");

    settle().await;
    let updated = User {
        name: "Alice Smith".to_string(),
        ..user
    };
    entity.set_as(&updated).await.unwrap();
    assert_eq!(entity.get_as::<User>().await.unwrap(), Some(updated));
}

/// Test 14: Concurrent access from several tasks
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_entities() {
    let cache = cache();
    let mut handles = vec![];

    for i in 0..10i64 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            let entity = cache
                .entity(EntityOptions::new("concurrent").with_param("n", i))
                .expect("valid entity");
            entity.set(i * 2).await.expect("set should succeed");
            entity.get().await.expect("get should succeed").0
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let value = handle.await.expect("task should not panic");
        assert_eq!(value, Some(CacheValue::Number(i as i64 * 2)));
    }

    let sweeper = cache.entity(EntityOptions::new("concurrent")).unwrap();
    sweeper.clear().await.unwrap();
    assert!(cache.backend().is_empty().await);
}
