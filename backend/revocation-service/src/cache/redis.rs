//! Redis-backed blacklist cache tier
//!
//! Every command runs under the configured response deadline so a slow or
//! unreachable Redis surfaces as a transient error within bounded time,
//! never as a hung request.

use crate::cache::TokenCache;
use crate::error::Result;
use async_trait::async_trait;
use redis_utils::{with_timeout, SharedConnectionManager};
use std::time::Duration;

pub struct RedisTokenCache {
    conn: SharedConnectionManager,
    response_timeout: Duration,
}

impl RedisTokenCache {
    pub fn new(conn: SharedConnectionManager, response_timeout: Duration) -> Self {
        Self {
            conn,
            response_timeout,
        }
    }
}

#[async_trait]
impl TokenCache for RedisTokenCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.lock().await.clone();
        let value: Option<String> = with_timeout(self.response_timeout, async {
            redis::cmd("GET").arg(key).query_async(&mut conn).await
        })
        .await?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return Ok(());
        }

        // SET .. EX is an absolute expiry; reads never extend it.
        let mut conn = self.conn.lock().await.clone();
        with_timeout(self.response_timeout, async {
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("EX")
                .arg(ttl.as_secs().max(1))
                .query_async::<_, ()>(&mut conn)
                .await
        })
        .await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        // DEL of a missing key is a no-op on the server side already.
        let mut conn = self.conn.lock().await.clone();
        with_timeout(self.response_timeout, async {
            redis::cmd("DEL")
                .arg(key)
                .query_async::<_, ()>(&mut conn)
                .await
        })
        .await?;

        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.lock().await.clone();
        let exists: bool = with_timeout(self.response_timeout, async {
            redis::cmd("EXISTS").arg(key).query_async(&mut conn).await
        })
        .await?;

        Ok(exists)
    }
}
