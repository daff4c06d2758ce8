//! Travel log handlers

use crate::api::handlers::{ApiState, AppError};
use crate::auth::extractor::AuthUser;
use crate::store::{NewTravelLog, TravelLog};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MAX_OWN_LOGS: usize = 500;
const MAX_ALL_LOGS: usize = 5000;
const MAX_ADMIN_LOGS: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct TravelLogRequest {
    pub meter_start: f64,
    pub meter_end: f64,
    pub official_km: f64,
    pub private_km: f64,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TravelCreatedResponse {
    pub msg: String,
    pub id: Uuid,
}

/// POST /api/travels: record a trip for the caller
pub async fn add_travel(
    State(state): State<ApiState>,
    user: AuthUser,
    Json(req): Json<TravelLogRequest>,
) -> Result<(StatusCode, Json<TravelCreatedResponse>), AppError> {
    if req.meter_end < req.meter_start {
        return Err(AppError::BadRequest(
            "End reading must be >= start".to_string(),
        ));
    }

    let log = state
        .travels
        .insert_travel(NewTravelLog {
            user_email: user.email,
            meter_start: req.meter_start,
            meter_end: req.meter_end,
            official_km: req.official_km,
            private_km: req.private_km,
            remarks: req.remarks.unwrap_or_default(),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(TravelCreatedResponse {
            msg: "Travel log added".to_string(),
            id: log.id,
        }),
    ))
}

/// GET /api/travels/me
pub async fn my_travels(
    State(state): State<ApiState>,
    user: AuthUser,
) -> Result<Json<Vec<TravelLog>>, AppError> {
    Ok(Json(
        state
            .travels
            .list_travels_for(&user.email, MAX_OWN_LOGS)
            .await?,
    ))
}

/// GET /api/travels/all (admin)
pub async fn all_travels(State(state): State<ApiState>) -> Result<Json<Vec<TravelLog>>, AppError> {
    Ok(Json(state.travels.list_all_travels(MAX_ALL_LOGS).await?))
}

/// GET /api/admin/all (admin)
pub async fn admin_all_travels(
    State(state): State<ApiState>,
) -> Result<Json<Vec<TravelLog>>, AppError> {
    Ok(Json(state.travels.list_all_travels(MAX_ADMIN_LOGS).await?))
}
