//! OIDC redirect callback.
//!
//! `GET /api/auth/callback?code=...`: the identity provider sends the browser
//! here after login. The code is exchanged server side and the provider's
//! tokens and profile are relayed to the frontend.

use crate::api::handlers::{ApiState, AppError};
use crate::auth::oidc::FederatedProfile;
use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub status: String,
    pub access_token: String,
    pub id_token: Option<String>,
    pub user: FederatedProfile,
}

/// GET /api/auth/callback
pub async fn oidc_callback(
    State(state): State<ApiState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<CallbackResponse>, AppError> {
    let client = state
        .oidc
        .as_ref()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("OIDC is not configured")))?;

    if query.code.is_empty() {
        return Err(AppError::BadRequest(
            "Missing authorization code".to_string(),
        ));
    }

    let login = client.exchange_code(&query.code).await?;

    Ok(Json(CallbackResponse {
        status: "success".to_string(),
        access_token: login.access_token,
        id_token: login.id_token,
        user: login.profile,
    }))
}
