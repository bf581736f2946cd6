/// Token Revocation Service Library
///
/// Invalidates issued JWT access/refresh tokens before their natural expiry
/// (logout, forced session termination) and answers, on every authenticated
/// request, whether a presented token id has been revoked.
///
/// ## Modules
///
/// - `config`: Service configuration and fail-open/fail-closed policy
/// - `cache`: Blacklist cache tiers (Redis, in-process)
/// - `db`: Token ledger (durable source of truth)
/// - `error`: Error types
/// - `middleware`: Request-path revocation guard (axum)
/// - `models`: Data models and statistics DTOs
/// - `security`: Structural JWT claims extraction
/// - `services`: Revocation orchestration
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod security;
pub mod services;

// Re-export commonly used types
pub use cache::{InMemoryTokenCache, RedisTokenCache, TokenCache};
pub use config::{FailMode, RevocationSettings, Settings};
pub use db::{PgTokenLedger, TokenLedger};
pub use error::{Result, RevocationError};
pub use middleware::{revocation_guard, AuthenticatedToken};
pub use models::{BlacklistStats, TokenRecord, TokenStatistics, TokenStatus, TokenType};
pub use security::{parse_unverified, ParsedToken, TokenParseError};
pub use services::RevocationService;
