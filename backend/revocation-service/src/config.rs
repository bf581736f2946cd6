//! Configuration management for the token revocation subsystem
//!
//! Loads settings from environment variables, with a `.env` file picked up in
//! development builds. Every knob has a default except the connection URLs.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::info;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub revocation: RevocationSettings,
}

impl Settings {
    /// Load settings from environment variables (and `.env` in development)
    pub fn load() -> Result<Self> {
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
            info!("Loaded .env file for development");
        }

        Ok(Settings {
            database: DatabaseSettings::from_env()?,
            redis: RedisSettings::from_env()?,
            revocation: RevocationSettings::from_env()?,
        })
    }
}

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
}

impl DatabaseSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?,
            min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .context("Invalid DATABASE_MIN_CONNECTIONS")?,
            acquire_timeout: env::var("DATABASE_ACQUIRE_TIMEOUT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid DATABASE_ACQUIRE_TIMEOUT")?,
        })
    }
}

/// Redis cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    pub url: String,
    pub response_timeout_ms: u64,
}

impl RedisSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("REDIS_URL").context("REDIS_URL must be set")?,
            response_timeout_ms: env::var("REDIS_RESPONSE_TIMEOUT_MS")
                .unwrap_or_else(|_| "200".to_string())
                .parse()
                .context("Invalid REDIS_RESPONSE_TIMEOUT_MS")?,
        })
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

/// Behavior when the revocation backends cannot answer on the request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailMode {
    /// Admit the request; an unreachable cache must not take down all
    /// authenticated traffic. The trade-off is a short window in which a
    /// revoked token could be accepted.
    Open,
    /// Reject the request; stronger guarantee at the cost of availability.
    Closed,
}

/// Revocation policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationSettings {
    pub fail_mode: FailMode,
    pub check_timeout_ms: u64,
    pub ledger_fallback: bool,
    pub stats_cache_ttl_secs: u64,
    pub cleanup_interval_secs: u64,
    pub key_prefix: String,
}

impl RevocationSettings {
    pub fn from_env() -> Result<Self> {
        let fail_mode = match env::var("REVOCATION_FAIL_MODE")
            .unwrap_or_else(|_| "open".to_string())
            .to_lowercase()
            .as_str()
        {
            "open" => FailMode::Open,
            "closed" => FailMode::Closed,
            other => bail!("Invalid REVOCATION_FAIL_MODE: {other} (expected open|closed)"),
        };

        Ok(Self {
            fail_mode,
            check_timeout_ms: env::var("REVOCATION_CHECK_TIMEOUT_MS")
                .unwrap_or_else(|_| "250".to_string())
                .parse()
                .context("Invalid REVOCATION_CHECK_TIMEOUT_MS")?,
            ledger_fallback: env::var("REVOCATION_LEDGER_FALLBACK")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .context("Invalid REVOCATION_LEDGER_FALLBACK")?,
            stats_cache_ttl_secs: env::var("REVOCATION_STATS_TTL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("Invalid REVOCATION_STATS_TTL_SECS")?,
            cleanup_interval_secs: env::var("REVOCATION_CLEANUP_INTERVAL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .context("Invalid REVOCATION_CLEANUP_INTERVAL_SECS")?,
            key_prefix: env::var("REVOCATION_KEY_PREFIX")
                .unwrap_or_else(|_| "auth:revoked:token".to_string()),
        })
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }

    pub fn stats_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.stats_cache_ttl_secs)
    }
}

impl Default for RevocationSettings {
    fn default() -> Self {
        Self {
            fail_mode: FailMode::Open,
            check_timeout_ms: 250,
            ledger_fallback: true,
            stats_cache_ttl_secs: 300,
            cleanup_interval_secs: 3600,
            key_prefix: "auth:revoked:token".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_revocation_settings_defaults() {
        env::remove_var("REVOCATION_FAIL_MODE");
        env::remove_var("REVOCATION_CHECK_TIMEOUT_MS");
        env::remove_var("REVOCATION_LEDGER_FALLBACK");
        env::remove_var("REVOCATION_STATS_TTL_SECS");
        env::remove_var("REVOCATION_CLEANUP_INTERVAL_SECS");
        env::remove_var("REVOCATION_KEY_PREFIX");

        let settings = RevocationSettings::from_env().unwrap();

        assert_eq!(settings.fail_mode, FailMode::Open);
        assert_eq!(settings.check_timeout_ms, 250);
        assert!(settings.ledger_fallback);
        assert_eq!(settings.stats_cache_ttl_secs, 300);
        assert_eq!(settings.key_prefix, "auth:revoked:token");
    }

    #[test]
    #[serial]
    fn test_revocation_settings_fail_closed() {
        env::set_var("REVOCATION_FAIL_MODE", "closed");
        env::set_var("REVOCATION_CHECK_TIMEOUT_MS", "100");

        let settings = RevocationSettings::from_env().unwrap();

        assert_eq!(settings.fail_mode, FailMode::Closed);
        assert_eq!(settings.check_timeout(), Duration::from_millis(100));

        env::remove_var("REVOCATION_FAIL_MODE");
        env::remove_var("REVOCATION_CHECK_TIMEOUT_MS");
    }

    #[test]
    #[serial]
    fn test_revocation_settings_rejects_unknown_fail_mode() {
        env::set_var("REVOCATION_FAIL_MODE", "maybe");

        let result = RevocationSettings::from_env();
        assert!(result.is_err());

        env::remove_var("REVOCATION_FAIL_MODE");
    }

    #[test]
    #[serial]
    fn test_database_settings_from_env() {
        env::set_var("DATABASE_URL", "postgres://localhost/tokens");
        env::set_var("DATABASE_MAX_CONNECTIONS", "40");

        let settings = DatabaseSettings::from_env().unwrap();

        assert_eq!(settings.url, "postgres://localhost/tokens");
        assert_eq!(settings.max_connections, 40);
        assert_eq!(settings.min_connections, 2); // Default

        env::remove_var("DATABASE_URL");
        env::remove_var("DATABASE_MAX_CONNECTIONS");
    }

    #[test]
    #[serial]
    fn test_redis_settings_from_env() {
        env::set_var("REDIS_URL", "redis://localhost:6379");

        let settings = RedisSettings::from_env().unwrap();

        assert_eq!(settings.url, "redis://localhost:6379");
        assert_eq!(settings.response_timeout(), Duration::from_millis(200)); // Default

        env::remove_var("REDIS_URL");
    }
}
