//! Blacklist cache tiers
//!
//! Two implementations of one contract: a Redis-backed distributed tier and
//! a `DashMap`-backed in-process tier. The host picks a tier at construction
//! time. With the distributed tier, cross-instance propagation is eventually
//! consistent, bounded by one cache round trip; with the in-process tier,
//! revocations are visible only to the writing instance. That window is a
//! documented property of the design, not something this module tries to
//! close with locks.

pub mod memory;
pub mod redis;

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub use self::memory::InMemoryTokenCache;
pub use self::redis::RedisTokenCache;

/// Key/value store with per-entry absolute expiration.
///
/// Contract notes:
/// - `set` on an existing key overwrites value and TTL (idempotent revoke);
///   a zero TTL must not insert anything.
/// - TTLs are absolute, never sliding: repeated reads must not extend an
///   entry's life.
/// - `remove` of a missing key is `Ok`.
/// - A backend failure is an `Err`, never `Ok(false)`/`Ok(None)`.
#[async_trait]
pub trait TokenCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Number of live entries, where the backend can answer cheaply
    fn entry_count(&self) -> Option<u64> {
        None
    }

    /// Rough memory footprint of live entries in bytes
    fn estimated_bytes(&self) -> Option<u64> {
        None
    }
}
