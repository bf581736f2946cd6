//! Structural JWT claims extraction
//!
//! The revocation subsystem only needs three claims from a presented token:
//! `jti` (the blacklist key), `sub` (owner) and `exp` (TTL derivation). This
//! module decodes the payload segment without verifying the signature —
//! signature and claims validation belong to the authentication layer, which
//! runs before anything here is consulted.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TokenParseError {
    #[error("token is not a structurally valid JWT")]
    Malformed,

    #[error("token payload is not valid JSON: {0}")]
    InvalidPayload(String),

    #[error("token has no jti claim")]
    MissingJti,

    #[error("token has no usable exp claim")]
    InvalidExpiry,

    #[error("token sub claim is not a UUID")]
    InvalidSubject,
}

/// The slice of a token this subsystem cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedToken {
    pub token_id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl ParsedToken {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    jti: Option<String>,
    sub: Option<String>,
    exp: Option<i64>,
}

/// Decode the payload segment of a compact JWS without signature verification.
///
/// Returns a tagged error rather than a nullable claim bag; callers decide
/// whether a parse failure is fatal (`blacklist` treats it as a no-op, since
/// an unparseable token cannot pass the authentication layer anyway).
pub fn parse_unverified(token: &str) -> Result<ParsedToken, TokenParseError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenParseError::Malformed);
    };

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| TokenParseError::Malformed)?;

    let raw: RawClaims = serde_json::from_slice(&payload_bytes)
        .map_err(|e| TokenParseError::InvalidPayload(e.to_string()))?;

    let token_id = raw.jti.filter(|j| !j.is_empty()).ok_or(TokenParseError::MissingJti)?;

    let exp = raw.exp.ok_or(TokenParseError::InvalidExpiry)?;
    let expires_at =
        DateTime::<Utc>::from_timestamp(exp, 0).ok_or(TokenParseError::InvalidExpiry)?;

    let user_id = raw
        .sub
        .as_deref()
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or(TokenParseError::InvalidSubject)?;

    Ok(ParsedToken {
        token_id,
        user_id,
        expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        jti: Option<String>,
        exp: i64,
    }

    fn mint(claims: &TestClaims) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap()
    }

    #[test]
    fn test_parses_real_token() {
        let user_id = Uuid::new_v4();
        let exp = Utc::now().timestamp() + 1800;
        let token = mint(&TestClaims {
            sub: user_id.to_string(),
            jti: Some("abc".to_string()),
            exp,
        });

        let parsed = parse_unverified(&token).unwrap();
        assert_eq!(parsed.token_id, "abc");
        assert_eq!(parsed.user_id, user_id);
        assert_eq!(parsed.expires_at.timestamp(), exp);
        assert!(!parsed.is_expired());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            parse_unverified("not-a-jwt"),
            Err(TokenParseError::Malformed)
        ));
        assert!(matches!(
            parse_unverified("a.b.c.d"),
            Err(TokenParseError::Malformed)
        ));
        assert!(matches!(
            parse_unverified("aaa.!!!.ccc"),
            Err(TokenParseError::Malformed)
        ));
    }

    #[test]
    fn test_rejects_missing_jti() {
        let token = mint(&TestClaims {
            sub: Uuid::new_v4().to_string(),
            jti: None,
            exp: Utc::now().timestamp() + 60,
        });

        assert!(matches!(
            parse_unverified(&token),
            Err(TokenParseError::MissingJti)
        ));
    }

    #[test]
    fn test_rejects_non_uuid_subject() {
        let token = mint(&TestClaims {
            sub: "service-account".to_string(),
            jti: Some("abc".to_string()),
            exp: Utc::now().timestamp() + 60,
        });

        assert!(matches!(
            parse_unverified(&token),
            Err(TokenParseError::InvalidSubject)
        ));
    }

    #[test]
    fn test_expired_token_still_parses() {
        let token = mint(&TestClaims {
            sub: Uuid::new_v4().to_string(),
            jti: Some("old".to_string()),
            exp: Utc::now().timestamp() - 60,
        });

        let parsed = parse_unverified(&token).unwrap();
        assert!(parsed.is_expired());
    }
}
