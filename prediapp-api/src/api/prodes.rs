//! Prediction endpoints
//!
//! "Prode" is the players' word for a prediction; race and non-race
//! variants are separate routes, delete infers the variant from the
//! stored rows.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use prediapp_common::models::{Prediction, RacePrediction, SessionPrediction};

use crate::db::predictions::{self, RacePredictionDraft, SessionPredictionDraft};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
pub struct UserPredictions {
    pub race: Vec<RacePrediction>,
    pub session: Vec<SessionPrediction>,
}

/// POST /prodes/carrera
pub async fn create_race_prediction(
    State(state): State<AppState>,
    Json(draft): Json<RacePredictionDraft>,
) -> ApiResult<(StatusCode, Json<RacePrediction>)> {
    let prediction = predictions::create_race_prediction(&state.db, draft, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(prediction)))
}

/// POST /prodes/session
pub async fn create_session_prediction(
    State(state): State<AppState>,
    Json(draft): Json<SessionPredictionDraft>,
) -> ApiResult<(StatusCode, Json<SessionPrediction>)> {
    let prediction =
        predictions::create_session_prediction(&state.db, draft, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(prediction)))
}

/// PUT /prodes/carrera/:id
pub async fn update_race_prediction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(draft): Json<RacePredictionDraft>,
) -> ApiResult<Json<RacePrediction>> {
    let prediction =
        predictions::update_race_prediction(&state.db, id, draft, Utc::now()).await?;
    Ok(Json(prediction))
}

/// PUT /prodes/session/:id
pub async fn update_session_prediction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(draft): Json<SessionPredictionDraft>,
) -> ApiResult<Json<SessionPrediction>> {
    let prediction =
        predictions::update_session_prediction(&state.db, id, draft, Utc::now()).await?;
    Ok(Json(prediction))
}

/// DELETE /prodes/:id
pub async fn delete_prediction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(owner): Query<OwnerQuery>,
) -> ApiResult<StatusCode> {
    predictions::delete_prediction(&state.db, &state.locks, id, owner.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /prodes/user/:user_id
pub async fn list_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<UserPredictions>> {
    let (race, session) = predictions::list_by_user(&state.db, user_id).await?;
    Ok(Json(UserPredictions { race, session }))
}

/// GET /prodes/carrera/session/:session_id
pub async fn list_race_by_session(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> ApiResult<Json<Vec<RacePrediction>>> {
    let list = predictions::list_race_by_session(&state.db, session_id).await?;
    Ok(Json(list))
}

/// GET /prodes/session/:session_id
pub async fn list_session_by_session(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> ApiResult<Json<Vec<SessionPrediction>>> {
    let list = predictions::list_session_by_session(&state.db, session_id).await?;
    Ok(Json(list))
}

/// GET /prodes/user/:user_id/session/:session_id
pub async fn get_by_user_and_session(
    State(state): State<AppState>,
    Path((user_id, session_id)): Path<(i64, i64)>,
) -> ApiResult<Json<Prediction>> {
    let prediction =
        predictions::get_by_user_and_session(&state.db, user_id, session_id).await?;
    Ok(Json(prediction))
}
