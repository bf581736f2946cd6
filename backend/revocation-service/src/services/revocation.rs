//! Revocation orchestration
//!
//! Coordinates blacklist writes and reads across the cache tier and the
//! token ledger. The cache entry is the authoritative fast-path signal; the
//! ledger write is best-effort audit state. The two writes are deliberately
//! not transactional (see module docs on `cache` for the consistency model).
//!
//! TTL derivation is the load-bearing decision here: a blacklist entry lives
//! exactly as long as the token it bans. Once the token would be rejected on
//! expiry grounds anyway, the entry is redundant and must be reclaimable, so
//! the cache can never grow past the set of outstanding unexpired tokens.

use crate::cache::TokenCache;
use crate::config::{FailMode, RevocationSettings};
use crate::db::TokenLedger;
use crate::error::Result;
use crate::models::BlacklistStats;
use crate::security::claims::{parse_unverified, ParsedToken};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

struct StatsSnapshot {
    stats: BlacklistStats,
    computed_at: Instant,
}

/// Orchestrates token blacklisting across the cache tier and the ledger.
///
/// Constructed once at startup with injected collaborators and shared by
/// `Arc`; holds no global state.
pub struct RevocationService {
    cache: Arc<dyn TokenCache>,
    ledger: Arc<dyn TokenLedger>,
    settings: RevocationSettings,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    stats_snapshot: RwLock<Option<StatsSnapshot>>,
}

impl RevocationService {
    pub fn new(
        cache: Arc<dyn TokenCache>,
        ledger: Arc<dyn TokenLedger>,
        settings: RevocationSettings,
    ) -> Self {
        Self {
            cache,
            ledger,
            settings,
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            stats_snapshot: RwLock::new(None),
        }
    }

    pub fn fail_mode(&self) -> FailMode {
        self.settings.fail_mode
    }

    pub fn check_timeout(&self) -> Duration {
        self.settings.check_timeout()
    }

    fn blacklist_key(&self, token_id: &str) -> String {
        format!("{}:{}", self.settings.key_prefix, token_id)
    }

    /// Revoke a presented token.
    ///
    /// A token that cannot be parsed is logged and dropped: it cannot pass
    /// the authentication layer either, so there is nothing to revoke. A
    /// token already past its expiry is a no-op success for the same reason.
    /// A cache write failure is the call's failure — logout must not be
    /// confirmed silently when the ban was not recorded.
    pub async fn blacklist(&self, token: &str, reason: Option<&str>) -> Result<()> {
        let parsed = match parse_unverified(token) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(error = %err, "discarding unparseable token on revoke");
                return Ok(());
            }
        };

        self.blacklist_parsed(&parsed, reason).await
    }

    /// Revoke a token whose claims are already in hand
    pub async fn blacklist_parsed(&self, parsed: &ParsedToken, reason: Option<&str>) -> Result<()> {
        let now = Utc::now();
        let remaining = parsed.expires_at - now;
        if remaining <= chrono::Duration::zero() {
            debug!(
                token_id = %id_prefix(&parsed.token_id),
                "token already expired; nothing to blacklist"
            );
            return Ok(());
        }

        let ttl = remaining.to_std().unwrap_or_default();
        self.cache
            .set(&self.blacklist_key(&parsed.token_id), "1", ttl)
            .await?;

        if let Err(err) = self
            .ledger
            .mark_revoked(&parsed.token_id, reason.map(ToOwned::to_owned), now)
            .await
        {
            warn!(
                token_id = %id_prefix(&parsed.token_id),
                error = %err,
                "ledger revocation write failed; cache entry remains authoritative"
            );
        }

        info!(
            token_id = %id_prefix(&parsed.token_id),
            ttl_secs = ttl.as_secs(),
            "token blacklisted"
        );
        Ok(())
    }

    /// Answer "is this token id revoked?" for the request path.
    ///
    /// Cache first; a clean miss is `false`. When the cache cannot answer,
    /// either the ledger is consulted (`ledger_fallback`) or the transient
    /// error propagates so the caller's fail-open/fail-closed policy decides.
    /// A backend failure is never folded into `false`.
    pub async fn is_blacklisted(&self, token_id: &str) -> Result<bool> {
        match self.cache.exists(&self.blacklist_key(token_id)).await {
            Ok(true) => {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                Ok(true)
            }
            Ok(false) => {
                self.cache_misses.fetch_add(1, Ordering::Relaxed);
                Ok(false)
            }
            Err(err) if self.settings.ledger_fallback => {
                warn!(
                    token_id = %id_prefix(token_id),
                    error = %err,
                    "cache unreachable; falling back to ledger"
                );
                self.ledger.is_blacklisted(token_id).await
            }
            Err(err) => Err(err),
        }
    }

    /// Revoke every live token of a user ("log out everywhere").
    ///
    /// The ledger transition is atomic; the cache is then populated eagerly
    /// per token so the read-after-write guarantee holds on this instance.
    /// Cache population failures degrade to ledger-only semantics.
    pub async fn revoke_all_for_user(&self, user_id: Uuid, reason: &str) -> Result<u64> {
        let revoked = self.ledger.revoke_all_for_user(user_id, reason).await?;

        for record in &revoked {
            let Some(remaining) = record.remaining_lifetime() else {
                continue;
            };
            let ttl = remaining.to_std().unwrap_or_default();
            if let Err(err) = self
                .cache
                .set(&self.blacklist_key(&record.token_id), "1", ttl)
                .await
            {
                warn!(
                    token_id = %id_prefix(&record.token_id),
                    error = %err,
                    "cache population failed after bulk revoke; ledger holds the revocation"
                );
            }
        }

        let count = revoked.len() as u64;
        warn!(%user_id, count, "all tokens revoked for user");
        Ok(count)
    }

    /// Hard-delete ledger rows past their natural expiry.
    ///
    /// Independent of cache TTL expiry (the cache self-cleans); this bounds
    /// ledger growth. Idempotent, so redundant runs from several workers are
    /// harmless.
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let expired = self.ledger.list_expired().await?;
        if expired.is_empty() {
            return Ok(0);
        }

        let removed = self.ledger.delete_expired(&expired).await?;
        info!(removed, "expired token records removed from ledger");
        Ok(removed)
    }

    /// Aggregate snapshot of ledger counts and cache instrumentation.
    ///
    /// Memoized for the configured stats TTL; that memoization is unrelated
    /// to blacklist entry TTLs.
    pub async fn stats(&self) -> Result<BlacklistStats> {
        {
            let guard = self.stats_snapshot.read().await;
            if let Some(snapshot) = guard.as_ref() {
                if snapshot.computed_at.elapsed() < self.settings.stats_cache_ttl() {
                    return Ok(snapshot.stats.clone());
                }
            }
        }

        let ledger = self.ledger.get_statistics().await?;
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let stats = BlacklistStats {
            ledger,
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_ratio: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            cache_entries: self.cache.entry_count(),
            cache_estimated_bytes: self.cache.estimated_bytes(),
            calculated_at: Utc::now(),
        };

        *self.stats_snapshot.write().await = Some(StatsSnapshot {
            stats: stats.clone(),
            computed_at: Instant::now(),
        });

        Ok(stats)
    }
}

/// Correlation prefix for logs; full token ids stay out of log streams.
fn id_prefix(token_id: &str) -> String {
    token_id.chars().take(8).collect()
}
