//! Error types for entity cache operations.

use std::fmt;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the entity cache.
///
/// Nothing is retried internally: every variant surfaces to the caller of the
/// operation that produced it. The only failures that are absorbed are the
/// best-effort write-back after a handler ran and the TTL command issued after
/// a write; both are logged instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// An entity was constructed with arguments that break its contract.
    ///
    /// Raised synchronously by `Entity::new` / `CacheService::entity` when:
    /// - the entity id is empty or whitespace
    /// - the namespace is empty or whitespace
    /// - the TTL is not a whole number of seconds
    ValidationError(String),

    /// Configuration error while building a `CacheConfig` or a backend.
    ///
    /// Common causes:
    /// - Missing or blank namespace
    /// - `ENTITY_CACHE_DISABLE` set to something other than `true`/`false`
    /// - Invalid connection string
    ConfigError(String),

    /// Backend storage error.
    ///
    /// Any failure reported by the store during `get`, `set`, `del` or
    /// `clear` (connection lost, protocol error, pool exhausted).
    StoreError(String),

    /// The user supplied handler failed while computing a value on a miss.
    ///
    /// Propagated as-is out of `Entity::get`; no fallback value is substituted.
    HandlerError(String),

    /// Encoding a value into its stored form failed.
    SerializationError(String),

    /// A stored record could not be decoded.
    ///
    /// Common causes:
    /// - NUMBER payload without any digits
    /// - OBJECT payload that is not valid JSON
    /// - BOOLEAN payload other than `true`/`false`/`1`/`0`
    /// - A typed record that lacks its `value` field
    DeserializationError(String),

    /// Generic error with custom message.
    Other(String),
}

impl Error {
    /// Whether the error came from the backing store.
    pub fn is_store_error(&self) -> bool {
        matches!(self, Error::StoreError(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::StoreError(msg) => write!(f, "Store error: {}", msg),
            Error::HandlerError(msg) => write!(f, "Handler error: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Error::StoreError(e.to_string())
        } else if e.is_syntax() || e.is_eof() || e.is_data() {
            Error::DeserializationError(e.to_string())
        } else {
            Error::SerializationError(e.to_string())
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::StoreError(e.to_string())
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::StoreError(format!("Redis error: {}", e))
    }
}
