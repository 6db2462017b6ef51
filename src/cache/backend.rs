//! Byte-level cache storage contract and the in-process backend.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::{DashMap, mapref::entry::Entry};
use tokio::time::Instant;

use super::CacheError;

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshnessOutcome {
    /// Payload held by the cache once the write completed.
    pub payload: Bytes,
    /// False when a fresher entry already existed and was kept.
    pub accepted: bool,
}

impl FreshnessOutcome {
    pub fn accepted(payload: Bytes) -> Self {
        Self {
            payload,
            accepted: true,
        }
    }

    pub fn kept(payload: Bytes) -> Self {
        Self {
            payload,
            accepted: false,
        }
    }
}

/// Storage tier for versioned, TTL-bound payloads.
///
/// `set_if_not_older` must run as one indivisible compare-then-store-then-read
/// against the backing store; callers add no locking of their own.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Payload stored under `key`, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    /// Store `payload` when `version` is not lower than the stored version
    /// (an absent or expired entry always loses). Accepted writes reset the TTL.
    async fn set_if_not_older(
        &self,
        key: &str,
        payload: Bytes,
        version: i64,
        ttl: Duration,
    ) -> Result<FreshnessOutcome, CacheError>;

    /// Remove `key` unconditionally. Removing a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Drop every expired entry and return how many were removed. Reads
    /// already ignore expired entries; this only reclaims space.
    async fn purge_expired(&self) -> Result<u64, CacheError>;
}

#[derive(Debug, Clone)]
struct StoredEntry {
    payload: Bytes,
    version: i64,
    expires_at: Instant,
}

impl StoredEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Process-local backend. The per-shard entry lock of the map makes the
/// conditional write atomic.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: DashMap<String, StoredEntry>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let now = Instant::now();
        let live = self
            .entries
            .get(key)
            .and_then(|entry| entry.is_live(now).then(|| entry.payload.clone()));
        if live.is_none() {
            self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        }
        Ok(live)
    }

    async fn set_if_not_older(
        &self,
        key: &str,
        payload: Bytes,
        version: i64,
        ttl: Duration,
    ) -> Result<FreshnessOutcome, CacheError> {
        let now = Instant::now();
        let fresh = StoredEntry {
            payload: payload.clone(),
            version,
            expires_at: now + ttl,
        };

        match self.entries.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) => {
                let current = occupied.get();
                if current.is_live(now) && current.version > version {
                    return Ok(FreshnessOutcome::kept(current.payload.clone()));
                }
                occupied.insert(fresh);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
            }
        }

        Ok(FreshnessOutcome::accepted(payload))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, CacheError> {
        let now = Instant::now();
        let mut purged = 0;
        self.entries.retain(|_, entry| {
            let live = entry.is_live(now);
            if !live {
                purged += 1;
            }
            live
        });
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn miss_is_not_an_error() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get("absent").await.expect("get"), None);
    }

    #[tokio::test]
    async fn equal_or_higher_versions_replace() {
        let backend = MemoryBackend::new();
        backend
            .set_if_not_older("k", Bytes::from_static(b"v1"), 1, TTL)
            .await
            .expect("set");

        let same = backend
            .set_if_not_older("k", Bytes::from_static(b"v1b"), 1, TTL)
            .await
            .expect("set");
        assert!(same.accepted);

        let higher = backend
            .set_if_not_older("k", Bytes::from_static(b"v2"), 2, TTL)
            .await
            .expect("set");
        assert_eq!(higher, FreshnessOutcome::accepted(Bytes::from_static(b"v2")));
        assert_eq!(
            backend.get("k").await.expect("get"),
            Some(Bytes::from_static(b"v2"))
        );
    }

    #[tokio::test]
    async fn older_version_returns_the_stored_payload() {
        let backend = MemoryBackend::new();
        backend
            .set_if_not_older("k", Bytes::from_static(b"v2"), 2, TTL)
            .await
            .expect("set");

        let outcome = backend
            .set_if_not_older("k", Bytes::from_static(b"v1"), 1, TTL)
            .await
            .expect("set");
        assert_eq!(outcome, FreshnessOutcome::kept(Bytes::from_static(b"v2")));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_read_as_absent_and_lose_to_any_version() {
        let backend = MemoryBackend::new();
        backend
            .set_if_not_older("k", Bytes::from_static(b"v5"), 5, Duration::from_secs(1))
            .await
            .expect("set");

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(backend.get("k").await.expect("get"), None);
        assert!(backend.is_empty());

        backend
            .set_if_not_older("k", Bytes::from_static(b"v5"), 5, Duration::from_secs(1))
            .await
            .expect("set");
        tokio::time::advance(Duration::from_secs(2)).await;
        let outcome = backend
            .set_if_not_older("k", Bytes::from_static(b"v0"), 0, TTL)
            .await
            .expect("set");
        assert!(outcome.accepted);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_expired_entries_nobody_reads() {
        let backend = MemoryBackend::new();
        for key in ["a", "b"] {
            backend
                .set_if_not_older(key, Bytes::from_static(b"short"), 0, Duration::from_secs(1))
                .await
                .expect("set");
        }
        backend
            .set_if_not_older("c", Bytes::from_static(b"long"), 0, TTL)
            .await
            .expect("set");

        assert_eq!(backend.purge_expired().await.expect("purge"), 0);
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(backend.purge_expired().await.expect("purge"), 2);
        assert_eq!(backend.len(), 1);
        assert_eq!(
            backend.get("c").await.expect("get"),
            Some(Bytes::from_static(b"long"))
        );
    }

    #[tokio::test]
    async fn delete_is_unconditional() {
        let backend = MemoryBackend::new();
        backend
            .set_if_not_older("k", Bytes::from_static(b"v9"), 9, TTL)
            .await
            .expect("set");
        backend.delete("k").await.expect("delete");
        backend.delete("k").await.expect("delete missing");

        let outcome = backend
            .set_if_not_older("k", Bytes::from_static(b"v1"), 1, TTL)
            .await
            .expect("set");
        assert!(outcome.accepted);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_converge_on_the_highest_version() {
        let backend = Arc::new(MemoryBackend::new());
        let mut handles = Vec::new();
        for version in (0..32_i64).rev() {
            let backend = Arc::clone(&backend);
            handles.push(tokio::spawn(async move {
                backend
                    .set_if_not_older("k", Bytes::from(version.to_string()), version, TTL)
                    .await
            }));
        }
        for handle in handles {
            handle.await.expect("join").expect("set");
        }

        assert_eq!(
            backend.get("k").await.expect("get"),
            Some(Bytes::from("31"))
        );
    }
}
