//! AuthUser extractor for Axum handlers.
//!
//! Reads the [`SessionClaims`] placed in request extensions by the auth
//! middleware. If a handler is mounted without the middleware, the extractor
//! verifies the Bearer header itself rather than letting the request through.

use crate::api::handlers::{ApiState, AppError};
use crate::auth::jwt::SessionClaims;
use crate::auth::middleware::authenticate;
use crate::store::Role;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

/// Authenticated caller identity, taken from the session token.
///
/// ```rust,ignore
/// async fn my_handler(user: AuthUser) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub email: String,
    /// Role at login time
    pub role: Role,
}

impl From<&SessionClaims> for AuthUser {
    fn from(claims: &SessionClaims) -> Self {
        Self {
            email: claims.sub.clone(),
            role: claims.role,
        }
    }
}

impl FromRequestParts<ApiState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> Result<Self, Self::Rejection> {
        if let Some(claims) = parts.extensions.get::<SessionClaims>() {
            return Ok(Self::from(claims));
        }
        let claims = authenticate(state, &parts.headers)?;
        Ok(Self::from(&claims))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{bearer, test_state};
    use axum::http::Request;

    #[test]
    fn test_auth_user_from_claims() {
        let claims = SessionClaims {
            sub: "alice@example.com".into(),
            role: Role::Admin,
            iat: 0,
            exp: 0,
        };
        let user = AuthUser::from(&claims);
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_prefers_claims_from_extensions() {
        let state = test_state();
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        parts.extensions.insert(SessionClaims {
            sub: "bob@example.com".into(),
            role: Role::Employee,
            iat: 0,
            exp: 0,
        });

        let user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.email, "bob@example.com");
    }

    #[tokio::test]
    async fn test_falls_back_to_header() {
        let state = test_state();
        let token = state.tokens.session.issue("carol@example.com", Role::Employee).unwrap();
        let (mut parts, _) = Request::builder()
            .header("authorization", bearer(&token))
            .body(())
            .unwrap()
            .into_parts();

        let user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.email, "carol@example.com");
    }

    #[tokio::test]
    async fn test_fails_closed_without_credentials() {
        let state = test_state();
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();

        let err = AuthUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
