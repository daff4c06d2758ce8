//! Shared server state, the HTTP error type, and service-level handlers

use crate::auth::jwt::TokenService;
use crate::auth::oidc::{OidcClient, OidcError};
use crate::auth::replay::CodeReplayGuard;
use crate::mailer::{MailError, ResetMailer};
use crate::store::{StoreError, TravelStore, UserStore};
use crate::Config;
use anyhow::Result;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared server state
pub struct ServerState {
    pub users: Arc<dyn UserStore>,
    pub travels: Arc<dyn TravelStore>,
    pub tokens: TokenService,
    /// None when no OIDC provider is configured
    pub oidc: Option<OidcClient>,
    pub mailer: Arc<dyn ResetMailer>,
    /// Base URL used in reset links
    pub frontend_url: String,
    pub bcrypt_cost: u32,
}

/// Shared API state
pub type ApiState = Arc<ServerState>;

impl ServerState {
    pub fn new(
        config: &Config,
        users: Arc<dyn UserStore>,
        travels: Arc<dyn TravelStore>,
        mailer: Arc<dyn ResetMailer>,
    ) -> Result<Self> {
        let tokens = TokenService::from_config(&config.auth)?;
        let oidc = config
            .oidc
            .as_ref()
            .map(|oidc| OidcClient::from_config(oidc, Arc::new(CodeReplayGuard::new())))
            .transpose()?;

        Ok(Self {
            users,
            travels,
            tokens,
            oidc,
            mailer,
            frontend_url: config.auth.frontend_url.clone(),
            bcrypt_cost: config.auth.bcrypt_cost,
        })
    }
}

// ============================================================================
// Service handlers
// ============================================================================

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check handler. The in-memory store has no connection to probe.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Root banner
pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "msg": "FuelTrackr API running successfully" }))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug)]
pub enum AppError {
    Internal(anyhow::Error),
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists => AppError::BadRequest("User already exists".into()),
            StoreError::NotFound => AppError::NotFound("User not found".into()),
            StoreError::NoChange => AppError::BadRequest("No changes applied".into()),
            StoreError::Backend(e) => AppError::Internal(e),
        }
    }
}

impl From<OidcError> for AppError {
    fn from(err: OidcError) -> Self {
        match err {
            OidcError::CodeAlreadyUsed | OidcError::ExchangeRejected { .. } => {
                AppError::BadRequest(err.to_string())
            }
            OidcError::InvalidTokenResponse(_) | OidcError::ProfileFetchFailed { .. } => {
                AppError::Unauthorized(err.to_string())
            }
            OidcError::ProviderUnreachable(_) => AppError::Internal(anyhow::Error::new(err)),
        }
    }
}

impl From<MailError> for AppError {
    fn from(err: MailError) -> Self {
        AppError::Internal(anyhow::Error::new(err))
    }
}
