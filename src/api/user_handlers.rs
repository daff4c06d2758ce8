//! User route handlers: registration, login, password reset, profiles, admin management.
//!
//! Endpoints:
//! - `POST   /api/users/register`: create an employee account
//! - `POST   /api/users/login`: email/password login, returns a session token
//! - `POST   /api/users/forgot-password`: mail a reset link
//! - `POST   /api/users/reset-password`: set a new password with a reset token
//! - `GET    /api/users/me`: own profile (authenticated)
//! - `PUT    /api/users/me`: update own name / fuel card (authenticated)
//! - `GET    /api/users/all`: every user (admin)
//! - `PUT    /api/users/{email}`: update any user, including role (admin)
//! - `DELETE /api/users/{email}`: delete any other user (admin)
//!
//! Every response carrying a user goes through [`PublicUser`], so the password
//! hash never leaves the store.

use crate::api::handlers::{ApiState, AppError};
use crate::auth::extractor::AuthUser;
use crate::auth::password::{hash_password, verify_password};
use crate::mailer::reset_link;
use crate::store::{PublicUser, Role, StoreError, User, UserPatch};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cap on the admin user listing
const MAX_LISTED_USERS: usize = 1000;

// ============================================================================
// Request / Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub fuel_card_no: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub msg: String,
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Self-service profile update. A `role` field, if sent, is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub fuel_card_no: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminUpdateUserRequest {
    pub name: Option<String>,
    pub fuel_card_no: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MsgResponse {
    pub msg: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

fn msg(text: impl Into<String>) -> Json<MsgResponse> {
    Json(MsgResponse { msg: text.into() })
}

fn message(text: impl Into<String>) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.into(),
    })
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

// ============================================================================
// Public handlers
// ============================================================================

/// POST /api/users/register
pub async fn register(
    State(state): State<ApiState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    if !is_plausible_email(&req.email) {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }
    if req.password.is_empty() {
        return Err(AppError::BadRequest("Password must not be empty".to_string()));
    }

    let hash = hash_password(&req.password, state.bcrypt_cost).await?;
    let user = state
        .users
        .create(User::new(&req.name, &req.email, hash, &req.fuel_card_no))
        .await?;
    tracing::info!(email = %user.email, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            msg: "User registered successfully".to_string(),
            id: user.id,
        }),
    ))
}

/// POST /api/users/login
///
/// Unknown email and wrong password produce the same 401.
pub async fn login(
    State(state): State<ApiState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let invalid_credentials = || AppError::Unauthorized("Invalid email or password".to_string());

    let Some(user) = state.users.find_by_email(&req.email).await? else {
        tracing::warn!("login attempt for unknown account");
        return Err(invalid_credentials());
    };
    if !verify_password(&req.password, &user.password_hash).await {
        tracing::warn!(email = %user.email, "login rejected: wrong password");
        return Err(invalid_credentials());
    }

    let access_token = state.tokens.session.issue(&user.email, user.role)?;
    tracing::debug!(email = %user.email, role = %user.role, "session issued");

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

/// POST /api/users/forgot-password
pub async fn forgot_password(
    State(state): State<ApiState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let user = state
        .users
        .find_by_email(&req.email)
        .await?
        .ok_or(StoreError::NotFound)?;

    let token = state.tokens.reset.issue(&user.email)?;
    let link = reset_link(&state.frontend_url, &token);
    state.mailer.send_reset(&user.email, &link).await?;

    Ok(message("Password reset link sent to your email"))
}

/// POST /api/users/reset-password
///
/// The token stays valid until it expires, so it can be replayed within its
/// lifetime.
pub async fn reset_password(
    State(state): State<ApiState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let claims = state.tokens.reset.verify(&req.token).map_err(|e| {
        tracing::debug!(reason = %e, "rejected reset token");
        AppError::BadRequest("Invalid or expired token".to_string())
    })?;
    if req.new_password.is_empty() {
        return Err(AppError::BadRequest("Password must not be empty".to_string()));
    }

    let hash = hash_password(&req.new_password, state.bcrypt_cost).await?;
    state.users.set_password_hash(&claims.sub, &hash).await?;
    tracing::info!(email = %claims.sub, "password reset");

    Ok(message("Password reset successful"))
}

// ============================================================================
// Authenticated handlers
// ============================================================================

/// GET /api/users/me
pub async fn get_me(
    State(state): State<ApiState>,
    user: AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    let record = state
        .users
        .find_by_email(&user.email)
        .await?
        .ok_or(StoreError::NotFound)?;
    Ok(Json(record.into()))
}

/// PUT /api/users/me
pub async fn update_me(
    State(state): State<ApiState>,
    user: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<MsgResponse>, AppError> {
    let patch = UserPatch {
        name: req.name,
        fuel_card_no: req.fuel_card_no,
        role: None,
    };
    if patch.is_empty() {
        return Err(AppError::BadRequest("No changes provided".to_string()));
    }

    state.users.update_fields(&user.email, &patch).await?;
    Ok(msg("Profile updated successfully"))
}

// ============================================================================
// Admin handlers
// ============================================================================

/// GET /api/users/all
pub async fn list_users(State(state): State<ApiState>) -> Result<Json<Vec<PublicUser>>, AppError> {
    let users = state.users.list(MAX_LISTED_USERS).await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

/// PUT /api/users/{email}
///
/// A patch that matches the record as it already is counts as success.
pub async fn admin_update_user(
    State(state): State<ApiState>,
    admin: AuthUser,
    Path(email): Path<String>,
    Json(req): Json<AdminUpdateUserRequest>,
) -> Result<Json<MsgResponse>, AppError> {
    let patch = UserPatch {
        name: req.name,
        fuel_card_no: req.fuel_card_no,
        role: req.role,
    };
    if patch.is_empty() {
        return Err(AppError::BadRequest("No changes provided".to_string()));
    }

    match state.users.update_fields(&email, &patch).await {
        Ok(_) | Err(StoreError::NoChange) => {}
        Err(e) => return Err(e.into()),
    }
    tracing::info!(admin = %admin.email, target = %email, role = ?patch.role, "user updated by admin");

    Ok(msg(format!("User {} updated successfully", email)))
}

/// DELETE /api/users/{email}
pub async fn delete_user(
    State(state): State<ApiState>,
    admin: AuthUser,
    Path(email): Path<String>,
) -> Result<Json<MsgResponse>, AppError> {
    if email == admin.email {
        return Err(AppError::Forbidden(
            "Admins cannot delete themselves".to_string(),
        ));
    }

    state.users.delete(&email).await?;
    tracing::info!(admin = %admin.email, target = %email, "user deleted by admin");

    Ok(msg(format!("User {} deleted successfully", email)))
}

// ============================================================================
// Tests
// ============================================================================
