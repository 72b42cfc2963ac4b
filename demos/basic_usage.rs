//! Basic usage example of entity-cache.

use entity_cache::{
    backend::InMemoryBackend, error::Result, observability::LogMetrics, CacheConfig,
    CacheService, CacheValue, EntityOptions, Handler, Params,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Example entity: Employment
#[derive(Clone, Serialize, Deserialize, Debug)]
struct Employment {
    id: String,
    loanapp_id: String,
    employer_name: String,
    salary: f64,
}

/// Simulates a database lookup
async fn fetch_employment(params: Params) -> Result<Option<CacheValue>> {
    let id = params
        .get("employmentId")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    println!("  [DB] Fetching employment: {}", id);

    let employment = match id.as_str() {
        "emp_001" => Some(Employment {
            id,
            loanapp_id: "loan_123".to_string(),
            employer_name: "Acme Corp".to_string(),
            salary: 75000.0,
        }),
        "emp_002" => Some(Employment {
            id,
            loanapp_id: "loan_456".to_string(),
            employer_name: "Tech Inc".to_string(),
            salary: 95000.0,
        }),
        _ => None,
    };

    employment
        .map(|e| CacheValue::from_serializable(&e))
        .transpose()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .try_init()
        .ok();

    println!("\n=== entity-cache - Basic Example ===\n");

    // 1. Build the service
    println!("1. Initializing in-memory cache service...");
    let backend = InMemoryBackend::new();
    let cache = CacheService::new(backend.clone(), CacheConfig::new("demo")?)
        .with_metrics(Arc::new(LogMetrics));
    println!("   ✓ Cache service ready\n");

    let employment = |id: &str| {
        cache.entity(
            EntityOptions::new("employment")
                .with_param("employmentId", id)
                .with_ttl(Duration::from_secs(300))
                .with_handler(Handler::from_async(fetch_employment)),
        )
    };

    // 2. First request - cache miss, the handler hits the database
    println!("2. First request for employment (emp_001):");
    let entity = employment("emp_001")?;
    if let Some(emp) = entity.get_as::<Employment>().await? {
        println!(
            "   ✓ Employment loaded: {} from {} (${:.2})\n",
            emp.employer_name, emp.id, emp.salary
        );
    }

    // Let the background write-back land.
    tokio::time::sleep(Duration::from_millis(10)).await;

    // 3. Second request - cache hit
    println!("3. Second request for same employment (emp_001):");
    if let Some(emp) = entity.get_as::<Employment>().await? {
        println!(
            "   ✓ Employment loaded from cache: {} (loan {})\n",
            emp.employer_name, emp.loanapp_id
        );
    }

    // 4. Unknown id - the handler answers "no value", nothing is cached
    println!("4. Request for unknown employment (emp_003):");
    let (value, value_type) = employment("emp_003")?.get().await?;
    println!("   ✓ value={:?} type={:?}\n", value, value_type);

    // 5. Explicit writes of primitive values
    println!("5. Caching primitive values:");
    let counter = cache.entity(EntityOptions::new("login-count").with_param("userId", 105368))?;
    counter.set(42).await?;
    let (value, value_type) = counter.get().await?;
    println!("   ✓ {} -> {:?} ({:?})\n", counter.key(), value, value_type);

    // 6. Invalidate a single variant
    println!("6. Deleting emp_001:");
    println!("   ✓ removed={}\n", entity.del().await?);

    // 7. Invalidate every variant of an entity id
    println!("7. Clearing every employment variant:");
    employment("emp_002")?.get().await?;
    tokio::time::sleep(Duration::from_millis(10)).await;
    employment("emp_001")?.clear().await?;
    println!("   ✓ {} entries left in the store\n", backend.len().await);

    backend.log_stats().await;

    println!("=== Example Complete ===\n");
    Ok(())
}
