//! Cache configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::application::pagination::{DEFAULT_PAGE_SIZE, PageSize};

const DEFAULT_TTL_SECONDS: u64 = 300;

/// Where cache entries live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackendKind {
    /// Process-local map. Entries are not shared between replicas.
    #[default]
    Memory,
    /// `cache_entries` table guarded by per-key advisory locks.
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Serve post lookups and first pages through the cache.
    pub enabled: bool,
    pub backend: CacheBackendKind,
    /// Lifetime of an entry after its last accepted write.
    pub ttl_seconds: u64,
    /// Canonical size of the cached per-author first page.
    pub first_page_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackendKind::Memory,
            ttl_seconds: DEFAULT_TTL_SECONDS,
            first_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            backend: settings.backend,
            ttl_seconds: settings.ttl_seconds.get(),
            first_page_size: settings.first_page_size.get() as usize,
        }
    }
}

impl CacheConfig {
    /// TTL as a duration, clamped to at least one second.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds.max(1))
    }

    pub fn first_page_size(&self) -> PageSize {
        PageSize::new(self.first_page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.backend, CacheBackendKind::Memory);
        assert_eq!(config.ttl(), Duration::from_secs(300));
        assert_eq!(config.first_page_size().get(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn zero_values_are_clamped() {
        let config = CacheConfig {
            ttl_seconds: 0,
            first_page_size: 0,
            ..Default::default()
        };
        assert_eq!(config.ttl(), Duration::from_secs(1));
        assert_eq!(config.first_page_size().get(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn backend_kind_deserializes_snake_case() {
        let kind: CacheBackendKind =
            serde_json::from_str("\"postgres\"").expect("backend kind parses");
        assert_eq!(kind, CacheBackendKind::Postgres);
    }
}
