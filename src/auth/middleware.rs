//! Auth middleware for Axum routes.
//!
//! - [`require_auth`]: validates the session Bearer token and injects
//!   [`SessionClaims`] into request extensions (401 on failure).
//! - [`require_role`]: same, then checks the role claim against the role held
//!   by its [`RoleGuard`] state (403 on mismatch).
//!
//! The role is read from the token, not from the store: a demoted admin keeps
//! admin access until their session token expires.

use crate::api::handlers::{ApiState, AppError, ServerState};
use crate::auth::jwt::{SessionClaims, TokenError};
use crate::store::Role;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

/// Verify the Bearer token in `headers` with the session context.
pub fn authenticate(state: &ServerState, headers: &HeaderMap) -> Result<SessionClaims, AppError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;

    state.tokens.session.verify(token).map_err(|e| {
        tracing::debug!(reason = %e, "rejected session token");
        match e {
            TokenError::Expired => AppError::Unauthorized("Token has expired".to_string()),
            TokenError::Malformed | TokenError::Invalid => {
                AppError::Unauthorized("Invalid token".to_string())
            }
        }
    })
}

/// Check the caller's role claim.
pub fn authorize(claims: &SessionClaims, required: Role) -> Result<(), AppError> {
    if claims.role == required {
        Ok(())
    } else {
        Err(AppError::Forbidden("Not authorized".to_string()))
    }
}

/// Middleware that requires a valid session token.
pub async fn require_auth(
    State(state): State<ApiState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = authenticate(&state, req.headers())?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// State for [`require_role`]: the server state plus the role to demand.
#[derive(Clone)]
pub struct RoleGuard {
    state: ApiState,
    required: Role,
}

impl RoleGuard {
    pub fn new(state: ApiState, required: Role) -> Self {
        Self { state, required }
    }
}

/// Middleware that requires a valid session token whose role matches.
///
/// ```rust,ignore
/// router.route_layer(from_fn_with_state(RoleGuard::new(state, Role::Admin), require_role))
/// ```
pub async fn require_role(
    State(guard): State<RoleGuard>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = authenticate(&guard.state, req.headers())?;
    authorize(&claims, guard.required)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

// ============================================================================
// Tests
// ============================================================================
