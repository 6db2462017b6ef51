//! Shared cache backend on the `cache_entries` table.
//!
//! The conditional write runs in one transaction that first takes a
//! transaction-scoped advisory lock on the key, so concurrent writers of the
//! same key are serialized by the database and no client locking is needed.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use sqlx::postgres::PgPool;

use crate::cache::{CacheBackend, CacheError, FreshnessOutcome};

#[derive(Clone)]
pub struct PgCacheBackend {
    pool: PgPool,
}

impl PgCacheBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

#[async_trait]
impl CacheBackend for PgCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let payload = sqlx::query_scalar::<_, Vec<u8>>(
            "SELECT payload FROM cache_entries WHERE key = $1 AND expires_at > now()",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(CacheError::backend)?;

        Ok(payload.map(Bytes::from))
    }

    async fn set_if_not_older(
        &self,
        key: &str,
        payload: Bytes,
        version: i64,
        ttl: Duration,
    ) -> Result<FreshnessOutcome, CacheError> {
        let mut tx = self.pool.begin().await.map_err(CacheError::backend)?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(CacheError::backend)?;

        let current = sqlx::query_as::<_, (Vec<u8>, i64)>(
            "SELECT payload, version FROM cache_entries WHERE key = $1 AND expires_at > now()",
        )
        .bind(key)
        .fetch_optional(&mut *tx)
        .await
        .map_err(CacheError::backend)?;

        if let Some((stored, stored_version)) = current
            && stored_version > version
        {
            tx.commit().await.map_err(CacheError::backend)?;
            return Ok(FreshnessOutcome::kept(Bytes::from(stored)));
        }

        sqlx::query(
            "INSERT INTO cache_entries (key, payload, version, expires_at) \
             VALUES ($1, $2, $3, now() + make_interval(secs => $4::double precision / 1000.0)) \
             ON CONFLICT (key) DO UPDATE \
             SET payload = EXCLUDED.payload, version = EXCLUDED.version, \
                 expires_at = EXCLUDED.expires_at",
        )
        .bind(key)
        .bind(&payload[..])
        .bind(version)
        .bind(ttl_millis(ttl))
        .execute(&mut *tx)
        .await
        .map_err(CacheError::backend)?;

        tx.commit().await.map_err(CacheError::backend)?;
        Ok(FreshnessOutcome::accepted(payload))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM cache_entries WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(CacheError::backend)?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, CacheError> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= now()")
            .execute(&self.pool)
            .await
            .map_err(CacheError::backend)?;
        Ok(result.rows_affected())
    }
}
