//! Typed cache over a [`CacheBackend`].

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, info};

use super::{CacheBackend, CacheError, CacheNamespace};

const METRIC_CACHE_HIT: &str = "murmur_cache_hit_total";
const METRIC_CACHE_MISS: &str = "murmur_cache_miss_total";
const METRIC_CACHE_STALE_WRITE: &str = "murmur_cache_stale_write_total";

/// Payloads that carry a monotonically growing version.
pub trait Versioned {
    fn version(&self) -> i64;
}

/// Cache bound to one payload shape and one key namespace.
pub struct VersionedCache<V> {
    backend: Arc<dyn CacheBackend>,
    namespace: CacheNamespace,
    ttl: Duration,
    _payload: PhantomData<fn() -> V>,
}

impl<V> Clone for VersionedCache<V> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            namespace: self.namespace,
            ttl: self.ttl,
            _payload: PhantomData,
        }
    }
}

impl<V> VersionedCache<V>
where
    V: Versioned + Serialize + DeserializeOwned,
{
    pub fn new(backend: Arc<dyn CacheBackend>, namespace: CacheNamespace, ttl: Duration) -> Self {
        Self {
            backend,
            namespace,
            ttl,
            _payload: PhantomData,
        }
    }

    pub fn namespace(&self) -> CacheNamespace {
        self.namespace
    }

    /// Cached value for `identity`, or `None` on a miss.
    pub async fn get(&self, identity: &str) -> Result<Option<V>, CacheError> {
        let key = self.namespace.key(identity);
        match self.backend.get(&key).await? {
            Some(payload) => {
                counter!(METRIC_CACHE_HIT, "namespace" => self.namespace.as_str()).increment(1);
                decode(&payload).map(Some)
            }
            None => {
                counter!(METRIC_CACHE_MISS, "namespace" => self.namespace.as_str()).increment(1);
                debug!(
                    target = "murmur::cache::versioned",
                    namespace = self.namespace.as_str(),
                    key = %key,
                    "cache miss"
                );
                Ok(None)
            }
        }
    }

    /// Offer `value` and return whatever the cache holds afterwards.
    ///
    /// When a concurrent writer already stored a higher version, that value
    /// is returned instead of `value`; callers must use the result.
    pub async fn set_with_freshness(&self, identity: &str, value: &V) -> Result<V, CacheError> {
        let key = self.namespace.key(identity);
        let payload = encode(value)?;
        let outcome = self
            .backend
            .set_if_not_older(&key, payload, value.version(), self.ttl)
            .await?;

        if !outcome.accepted {
            counter!(METRIC_CACHE_STALE_WRITE, "namespace" => self.namespace.as_str())
                .increment(1);
            info!(
                target = "murmur::cache::versioned",
                namespace = self.namespace.as_str(),
                key = %key,
                offered_version = value.version(),
                "kept fresher cache entry"
            );
        }

        decode(&outcome.payload)
    }

    pub async fn delete(&self, identity: &str) -> Result<(), CacheError> {
        let key = self.namespace.key(identity);
        self.backend.delete(&key).await?;
        debug!(
            target = "murmur::cache::versioned",
            namespace = self.namespace.as_str(),
            key = %key,
            "invalidated cache entry"
        );
        Ok(())
    }
}

fn encode<V: Serialize>(value: &V) -> Result<Bytes, CacheError> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(CacheError::codec)
}

fn decode<V: DeserializeOwned>(payload: &[u8]) -> Result<V, CacheError> {
    serde_json::from_slice(payload).map_err(CacheError::codec)
}
