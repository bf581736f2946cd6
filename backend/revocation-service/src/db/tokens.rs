//! Token ledger database operations
//!
//! The ledger is the durable record of every issued token and the source of
//! truth when the cache misses or is unreachable. The hot-path queries
//! (`get_by_token_id`, `is_valid`, `is_blacklisted`) ride the unique index on
//! `token_id`; `list_expired`/`delete_expired` ride the `expires_at` index.

use crate::error::{Result, RevocationError};
use crate::models::{TokenRecord, TokenStatistics};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const RECORD_COLUMNS: &str = "id, token_id, user_id, token_type, status, \
     issued_at, expires_at, revoked_at, revocation_reason, created_at";

/// Durable record of issued-token lifecycle state
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenLedger: Send + Sync {
    async fn get_by_token_id(&self, token_id: &str) -> Result<Option<TokenRecord>>;

    /// Exists, still Active, and not past natural expiry
    async fn is_valid(&self, token_id: &str) -> Result<bool>;

    /// Revoked and not yet past natural expiry
    async fn is_blacklisted(&self, token_id: &str) -> Result<bool>;

    /// Record a freshly issued token
    async fn add(&self, token: &TokenRecord) -> Result<()>;

    async fn update(&self, token: &TokenRecord) -> Result<()>;

    /// Best-effort audit write backing a cache-side revocation
    async fn mark_revoked(
        &self,
        token_id: &str,
        reason: Option<String>,
        revoked_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Atomic Active -> Revoked transition for every live token of a user.
    /// Returns the affected rows so the caller can populate the cache tier.
    async fn revoke_all_for_user(&self, user_id: Uuid, reason: &str) -> Result<Vec<TokenRecord>>;

    async fn list_expired(&self) -> Result<Vec<TokenRecord>>;

    /// Hard delete; the SQL re-checks `expires_at` so a live row can never be
    /// removed even if the input list is stale.
    async fn delete_expired(&self, tokens: &[TokenRecord]) -> Result<u64>;

    async fn get_statistics(&self) -> Result<TokenStatistics>;
}

/// Postgres-backed ledger
pub struct PgTokenLedger {
    pool: PgPool,
}

impl PgTokenLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenLedger for PgTokenLedger {
    async fn get_by_token_id(&self, token_id: &str) -> Result<Option<TokenRecord>> {
        let record = sqlx::query_as::<_, TokenRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM issued_tokens WHERE token_id = $1"
        ))
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RevocationError::Database(e.to_string()))?;

        Ok(record)
    }

    async fn is_valid(&self, token_id: &str) -> Result<bool> {
        let valid = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM issued_tokens
                WHERE token_id = $1 AND status = 'active' AND expires_at > NOW()
            )
            "#,
        )
        .bind(token_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RevocationError::Database(e.to_string()))?;

        Ok(valid)
    }

    async fn is_blacklisted(&self, token_id: &str) -> Result<bool> {
        let blacklisted = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM issued_tokens
                WHERE token_id = $1 AND status = 'revoked' AND expires_at > NOW()
            )
            "#,
        )
        .bind(token_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RevocationError::Database(e.to_string()))?;

        Ok(blacklisted)
    }

    async fn add(&self, token: &TokenRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO issued_tokens (
                id, token_id, user_id, token_type, status,
                issued_at, expires_at, revoked_at, revocation_reason, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(token.id)
        .bind(&token.token_id)
        .bind(token.user_id)
        .bind(token.token_type)
        .bind(token.status)
        .bind(token.issued_at)
        .bind(token.expires_at)
        .bind(token.revoked_at)
        .bind(&token.revocation_reason)
        .bind(token.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RevocationError::Database(e.to_string()))?;

        Ok(())
    }

    async fn update(&self, token: &TokenRecord) -> Result<()> {
        // expires_at is immutable once issued, so it is not in the SET list.
        sqlx::query(
            r#"
            UPDATE issued_tokens
            SET status = $2, revoked_at = $3, revocation_reason = $4
            WHERE token_id = $1
            "#,
        )
        .bind(&token.token_id)
        .bind(token.status)
        .bind(token.revoked_at)
        .bind(&token.revocation_reason)
        .execute(&self.pool)
        .await
        .map_err(|e| RevocationError::Database(e.to_string()))?;

        Ok(())
    }

    async fn mark_revoked(
        &self,
        token_id: &str,
        reason: Option<String>,
        revoked_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE issued_tokens
            SET status = 'revoked', revoked_at = $2, revocation_reason = $3
            WHERE token_id = $1 AND status = 'active'
            "#,
        )
        .bind(token_id)
        .bind(revoked_at)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(|e| RevocationError::Database(e.to_string()))?;

        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid, reason: &str) -> Result<Vec<TokenRecord>> {
        let revoked = sqlx::query_as::<_, TokenRecord>(&format!(
            r#"
            UPDATE issued_tokens
            SET status = 'revoked', revoked_at = $3, revocation_reason = $2
            WHERE user_id = $1 AND status = 'active' AND expires_at > $3
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(reason)
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RevocationError::Database(e.to_string()))?;

        Ok(revoked)
    }

    async fn list_expired(&self) -> Result<Vec<TokenRecord>> {
        let expired = sqlx::query_as::<_, TokenRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM issued_tokens WHERE expires_at < NOW()"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RevocationError::Database(e.to_string()))?;

        Ok(expired)
    }

    async fn delete_expired(&self, tokens: &[TokenRecord]) -> Result<u64> {
        if tokens.is_empty() {
            return Ok(0);
        }

        let ids: Vec<Uuid> = tokens.iter().map(|t| t.id).collect();
        let result = sqlx::query(
            r#"
            DELETE FROM issued_tokens
            WHERE id = ANY($1) AND expires_at < NOW()
            "#,
        )
        .bind(&ids)
        .execute(&self.pool)
        .await
        .map_err(|e| RevocationError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn get_statistics(&self) -> Result<TokenStatistics> {
        let stats = sqlx::query_as::<_, TokenStatistics>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'active' AND expires_at > NOW())  AS active_tokens,
                COUNT(*) FILTER (WHERE status = 'revoked' AND expires_at > NOW()) AS revoked_tokens,
                COUNT(*) FILTER (WHERE expires_at <= NOW())                       AS expired_tokens,
                COUNT(*) FILTER (WHERE token_type = 'access')                     AS access_tokens,
                COUNT(*) FILTER (WHERE token_type = 'refresh')                    AS refresh_tokens,
                COUNT(*) FILTER (WHERE issued_at > NOW() - INTERVAL '24 hours')   AS issued_last_24h,
                COUNT(*) FILTER (WHERE revoked_at > NOW() - INTERVAL '24 hours')  AS revoked_last_24h
            FROM issued_tokens
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RevocationError::Database(e.to_string()))?;

        Ok(stats)
    }
}
