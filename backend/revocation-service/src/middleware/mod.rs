//! Request-path revocation guard
//!
//! Runs after the host's signature/claims validation layer and before the
//! handler. That layer inserts an [`AuthenticatedToken`] extension; this
//! guard only asks one question — "is this token id revoked?" — and converts
//! "yes" into an authentication failure.
//!
//! The rejection body is the same for every internal cause (revoked,
//! malformed wiring, backend down under fail-closed); the distinctions live
//! in logs only, so the response is useless as an oracle.
//!
//! When neither cache nor ledger can answer inside the configured deadline,
//! the configured [`FailMode`](crate::config::FailMode) decides between
//! admitting the request and rejecting it. Both choices are legitimate; the
//! default is fail-open so a cache outage does not take down every
//! authenticated call.

use crate::config::FailMode;
use crate::services::RevocationService;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Identity of the already-validated bearer token, inserted into request
/// extensions by the authentication layer.
#[derive(Debug, Clone)]
pub struct AuthenticatedToken {
    pub token_id: String,
    pub user_id: Uuid,
}

/// axum middleware: reject requests whose token has been revoked.
///
/// Mount with `axum::middleware::from_fn_with_state` behind the signature
/// validation layer.
pub async fn revocation_guard(
    State(service): State<Arc<RevocationService>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(token) = req.extensions().get::<AuthenticatedToken>().cloned() else {
        // Only reachable through a wiring bug: the auth layer must run first.
        error!("revocation guard reached without an authenticated token extension");
        return unauthorized();
    };

    let check = tokio::time::timeout(
        service.check_timeout(),
        service.is_blacklisted(&token.token_id),
    )
    .await;

    match check {
        Ok(Ok(false)) => next.run(req).await,
        Ok(Ok(true)) => {
            info!(user_id = %token.user_id, "rejected revoked token");
            unauthorized()
        }
        Ok(Err(err)) => apply_fail_mode(service.fail_mode(), &err.to_string(), req, next).await,
        Err(_elapsed) => {
            apply_fail_mode(service.fail_mode(), "revocation check timed out", req, next).await
        }
    }
}

async fn apply_fail_mode(mode: FailMode, cause: &str, req: Request, next: Next) -> Response {
    match mode {
        FailMode::Open => {
            warn!(cause, "revocation backends unavailable; admitting request (fail-open)");
            next.run(req).await
        }
        FailMode::Closed => {
            error!(cause, "revocation backends unavailable; rejecting request (fail-closed)");
            unauthorized()
        }
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "unauthorized",
            "message": "token is invalid or has been revoked",
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{InMemoryTokenCache, TokenCache};
    use crate::config::RevocationSettings;
    use crate::db::tokens::MockTokenLedger;
    use crate::error::{Result, RevocationError};
    use async_trait::async_trait;
    use axum::{body::Body, middleware::from_fn_with_state, routing::get, Router};
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    struct UnreachableCache;

    #[async_trait]
    impl TokenCache for UnreachableCache {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(RevocationError::Cache("connection refused".into()))
        }
        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<()> {
            Err(RevocationError::Cache("connection refused".into()))
        }
        async fn remove(&self, _key: &str) -> Result<()> {
            Err(RevocationError::Cache("connection refused".into()))
        }
        async fn exists(&self, _key: &str) -> Result<bool> {
            Err(RevocationError::Cache("connection refused".into()))
        }
    }

    fn router(service: Arc<RevocationService>) -> Router {
        Router::new()
            .route("/profile", get(|| async { "ok" }))
            .layer(from_fn_with_state(service, revocation_guard))
    }

    fn authed_request(token_id: &str) -> Request {
        let mut req = Request::builder()
            .uri("/profile")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut().insert(AuthenticatedToken {
            token_id: token_id.to_string(),
            user_id: Uuid::new_v4(),
        });
        req
    }

    fn healthy_service(settings: RevocationSettings) -> Arc<RevocationService> {
        let mut ledger = MockTokenLedger::new();
        ledger.expect_mark_revoked().returning(|_, _, _| Ok(()));
        Arc::new(RevocationService::new(
            Arc::new(InMemoryTokenCache::new()),
            Arc::new(ledger),
            settings,
        ))
    }

    #[tokio::test]
    async fn test_clear_token_passes_through() {
        let app = router(healthy_service(RevocationSettings::default()));

        let response = app.oneshot(authed_request("clear")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_revoked_token_is_rejected_with_generic_body() {
        let cache = InMemoryTokenCache::new();
        cache
            .set("auth:revoked:token:gone", "1", Duration::from_secs(60))
            .await
            .unwrap();
        let mut ledger = MockTokenLedger::new();
        ledger.expect_mark_revoked().returning(|_, _, _| Ok(()));
        let service = Arc::new(RevocationService::new(
            Arc::new(cache),
            Arc::new(ledger),
            RevocationSettings::default(),
        ));

        let app = router(service);
        let response = app.oneshot(authed_request("gone")).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "unauthorized");
        // No hint of "revoked" vs any other internal cause.
        assert_eq!(json["message"], "token is invalid or has been revoked");
    }

    #[tokio::test]
    async fn test_backend_outage_fails_open_by_default() {
        let mut ledger = MockTokenLedger::new();
        ledger
            .expect_is_blacklisted()
            .returning(|_| Err(RevocationError::Database("down".into())));
        let service = Arc::new(RevocationService::new(
            Arc::new(UnreachableCache),
            Arc::new(ledger),
            RevocationSettings::default(),
        ));

        let app = router(service);
        let response = app.oneshot(authed_request("abc")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_backend_outage_fails_closed_when_configured() {
        let mut ledger = MockTokenLedger::new();
        ledger
            .expect_is_blacklisted()
            .returning(|_| Err(RevocationError::Database("down".into())));
        let settings = RevocationSettings {
            fail_mode: FailMode::Closed,
            ..RevocationSettings::default()
        };
        let service = Arc::new(RevocationService::new(
            Arc::new(UnreachableCache),
            Arc::new(ledger),
            settings,
        ));

        let app = router(service);
        let response = app.oneshot(authed_request("abc")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_token_extension_is_rejected() {
        let app = router(healthy_service(RevocationSettings::default()));

        let req = Request::builder()
            .uri("/profile")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
