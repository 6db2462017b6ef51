//! Versioned cache tier.
//!
//! Every write goes through one atomic primitive, "store only if not older":
//! an offered value replaces the cached one only when its version is greater
//! than or equal to the stored version. A slow populate that raced with an
//! edit therefore cannot overwrite the fresher entry.
//!
//! - [`CacheBackend`] is the byte-level contract a storage tier implements.
//! - [`VersionedCache`] is typed over a payload that exposes a version.
//! - [`CachedPostsRepo`] decorates a post repository with cache-aside reads,
//!   invalidation on writes and a reshaped per-author first page.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! backend = "memory"   # or "postgres"
//! ttl_seconds = 300
//! first_page_size = 10
//! ```

mod backend;
mod config;
mod keys;
mod posts;
mod versioned;

use thiserror::Error;

pub use backend::{CacheBackend, FreshnessOutcome, MemoryBackend};
pub use config::{CacheBackendKind, CacheConfig};
pub use keys::CacheNamespace;
pub use posts::{CachedPostsRepo, FirstPagePack, PostEntry};
pub use versioned::{Versioned, VersionedCache};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("cache payload codec error: {0}")]
    Codec(String),
}

impl CacheError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }

    pub fn codec(err: impl std::fmt::Display) -> Self {
        Self::Codec(err.to_string())
    }
}
