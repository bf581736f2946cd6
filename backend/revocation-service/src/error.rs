use thiserror::Error;

pub type Result<T> = std::result::Result<T, RevocationError>;

/// Backend failures surfaced by the revocation subsystem.
///
/// All variants are transient-class: they mean "could not determine", never
/// "not blacklisted". Callers on the request path decide fail-open vs
/// fail-closed; nothing in this crate collapses an error into `false`.
#[derive(Debug, Error)]
pub enum RevocationError {
    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Database error: {0}")]
    Database(String),
}

// Conversions from external error types
impl From<redis::RedisError> for RevocationError {
    fn from(err: redis::RedisError) -> Self {
        tracing::error!("Redis error: {}", err);
        RevocationError::Cache(err.to_string())
    }
}

impl From<sqlx::Error> for RevocationError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);
        RevocationError::Database(err.to_string())
    }
}
