//! In-process blacklist cache tier
//!
//! Backed by a `DashMap` with lazy eviction: expired entries are dropped on
//! the read that finds them, and `purge_expired` sweeps the rest for callers
//! running a periodic maintenance tick. Uses `tokio::time::Instant` so the
//! clock can be paused and advanced in tests.

use crate::cache::TokenCache;
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Default)]
pub struct InMemoryTokenCache {
    entries: DashMap<String, Entry>,
}

impl InMemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry past its expiry; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    fn live_value(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        // Clone out before any remove; dashmap deadlocks if a shard guard is
        // still held when the same shard is written.
        let hit = self
            .entries
            .get(key)
            .map(|entry| (entry.value.clone(), entry.expires_at));

        match hit {
            Some((value, expires_at)) if expires_at > now => Some(value),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl TokenCache for InMemoryTokenCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.live_value(key))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return Ok(());
        }

        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.live_value(key).is_some())
    }

    fn entry_count(&self) -> Option<u64> {
        Some(self.entries.len() as u64)
    }

    fn estimated_bytes(&self) -> Option<u64> {
        const ENTRY_OVERHEAD: u64 = 48;
        let bytes: u64 = self
            .entries
            .iter()
            .map(|e| e.key().len() as u64 + e.value().value.len() as u64 + ENTRY_OVERHEAD)
            .sum();
        Some(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_self_expires() {
        let cache = InMemoryTokenCache::new();
        cache
            .set("revoked:token:abc", "1", Duration::from_secs(600))
            .await
            .unwrap();

        assert!(cache.exists("revoked:token:abc").await.unwrap());

        tokio::time::advance(Duration::from_secs(601)).await;

        assert!(!cache.exists("revoked:token:abc").await.unwrap());
        assert!(cache.get("revoked:token:abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_overwrites_value_and_ttl() {
        let cache = InMemoryTokenCache::new();
        cache.set("k", "1", Duration::from_secs(60)).await.unwrap();
        cache.set("k", "2", Duration::from_secs(120)).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("2"));
        assert_eq!(cache.entry_count(), Some(1));
    }

    #[tokio::test]
    async fn test_zero_ttl_does_not_insert() {
        let cache = InMemoryTokenCache::new();
        cache.set("k", "1", Duration::ZERO).await.unwrap();

        assert!(!cache.exists("k").await.unwrap());
        assert_eq!(cache.entry_count(), Some(0));
    }

    #[tokio::test]
    async fn test_remove_missing_key_is_ok() {
        let cache = InMemoryTokenCache::new();
        cache.remove("missing").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_only_removes_dead_entries() {
        let cache = InMemoryTokenCache::new();
        cache.set("old", "1", Duration::from_secs(10)).await.unwrap();
        cache.set("new", "1", Duration::from_secs(100)).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.exists("new").await.unwrap());
        assert_eq!(cache.purge_expired(), 0);
    }

    #[tokio::test]
    async fn test_estimated_bytes_tracks_entries() {
        let cache = InMemoryTokenCache::new();
        assert_eq!(cache.estimated_bytes(), Some(0));

        cache.set("key", "1", Duration::from_secs(60)).await.unwrap();
        assert!(cache.estimated_bytes().unwrap() > 0);
    }
}
