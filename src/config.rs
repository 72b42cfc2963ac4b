//! Process-level cache configuration.
//!
//! A `CacheConfig` is built once at startup and handed to a
//! [`CacheService`](crate::CacheService), which stamps its namespace and TTL
//! policy onto every entity it creates.

use crate::error::{Error, Result};
use std::time::Duration;

/// Environment variable holding the namespace.
pub const NAMESPACE_ENV: &str = "ENTITY_CACHE_NAMESPACE";

/// Environment variable toggling the cache off (`true` / `false`).
pub const DISABLE_ENV: &str = "ENTITY_CACHE_DISABLE";

/// TTL every entity gets while the cache is disabled.
pub const DISABLED_TTL: Duration = Duration::from_secs(1);

/// Validated namespace plus the "disable cache" switch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    namespace: String,
    disable_cache: bool,
}

impl CacheConfig {
    /// Create a configuration for `namespace`.
    ///
    /// # Errors
    ///
    /// `Error::ConfigError` if the namespace is empty or whitespace.
    pub fn new(namespace: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        if namespace.trim().is_empty() {
            return Err(Error::ConfigError(
                "namespace must be a non-empty string".to_string(),
            ));
        }

        Ok(CacheConfig {
            namespace,
            disable_cache: false,
        })
    }

    /// With the cache disabled, every entity expires after one second.
    pub fn with_disable_cache(mut self, disable: bool) -> Self {
        if disable {
            debug!("cache is disabled, ttl forced to {:?}", DISABLED_TTL);
        }
        self.disable_cache = disable;
        self
    }

    /// Read `ENTITY_CACHE_NAMESPACE` and `ENTITY_CACHE_DISABLE`.
    ///
    /// # Errors
    ///
    /// `Error::ConfigError` if the namespace is missing or blank, or the
    /// disable flag is not `true`/`false`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let namespace = lookup(NAMESPACE_ENV)
            .ok_or_else(|| Error::ConfigError(format!("{} is not set", NAMESPACE_ENV)))?;

        let disable_cache = match lookup(DISABLE_ENV) {
            None => false,
            Some(raw) => match raw.trim() {
                "true" => true,
                "false" => false,
                other => {
                    return Err(Error::ConfigError(format!(
                        "{} must be boolean, got {:?}",
                        DISABLE_ENV, other
                    )))
                }
            },
        };

        Ok(Self::new(namespace)?.with_disable_cache(disable_cache))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn disable_cache(&self) -> bool {
        self.disable_cache
    }

    /// TTL an entity actually gets, given the one it asked for.
    pub fn effective_ttl(&self, requested: Option<Duration>) -> Option<Duration> {
        if self.disable_cache {
            Some(DISABLED_TTL)
        } else {
            requested
        }
    }
}
