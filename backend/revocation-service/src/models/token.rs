use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Token kind, mirrored in the `token_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Lifecycle state of an issued token.
///
/// Only `Active` and `Revoked` are ever stored; `Expired` is computed from
/// `expires_at` (see [`TokenRecord::effective_status`]), so no background job
/// has to flip rows when they age out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Active,
    Revoked,
    Expired,
}

/// Ledger entry for an issued token
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TokenRecord {
    pub id: Uuid,
    /// JWT `jti` claim, unique per token
    pub token_id: String,
    pub user_id: Uuid,
    pub token_type: TokenType,
    pub status: TokenStatus,
    pub issued_at: DateTime<Utc>,
    /// Immutable once set at issuance
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revocation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TokenRecord {
    /// Build the ledger row for a freshly issued token
    pub fn issue(
        token_id: impl Into<String>,
        user_id: Uuid,
        token_type: TokenType,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            token_id: token_id.into(),
            user_id,
            token_type,
            status: TokenStatus::Active,
            issued_at,
            expires_at,
            revoked_at: None,
            revocation_reason: None,
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }

    /// Stored status with natural expiry overlaid
    pub fn effective_status(&self) -> TokenStatus {
        if self.is_expired() {
            TokenStatus::Expired
        } else {
            self.status
        }
    }

    /// Time left until natural expiry, `None` once the token is past it
    pub fn remaining_lifetime(&self) -> Option<Duration> {
        let remaining = self.expires_at - Utc::now();
        (remaining > Duration::zero()).then_some(remaining)
    }
}

/// Aggregate counts computed from the ledger in a single query
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TokenStatistics {
    pub active_tokens: i64,
    pub revoked_tokens: i64,
    pub expired_tokens: i64,
    pub access_tokens: i64,
    pub refresh_tokens: i64,
    pub issued_last_24h: i64,
    pub revoked_last_24h: i64,
}

/// Point-in-time snapshot combining ledger counts with cache instrumentation.
///
/// Recomputed on demand and memoized briefly by the service; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct BlacklistStats {
    pub ledger: TokenStatistics,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_ratio: f64,
    pub cache_entries: Option<u64>,
    pub cache_estimated_bytes: Option<u64>,
    pub calculated_at: DateTime<Utc>,
}
