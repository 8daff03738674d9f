//! Session registry endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::json;

use prediapp_common::models::Session;

use crate::db::sessions::{self, SessionDraft};
use crate::error::ApiResult;
use crate::AppState;

/// POST /sessions
pub async fn create_session(
    State(state): State<AppState>,
    Json(draft): Json<SessionDraft>,
) -> ApiResult<(StatusCode, Json<Session>)> {
    let session = sessions::create_session(&state.db, draft).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// PUT /sessions/:id
pub async fn update_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(draft): Json<SessionDraft>,
) -> ApiResult<Json<Session>> {
    let session = sessions::update_session(&state.db, id, draft).await?;
    Ok(Json(session))
}

/// GET /sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Session>> {
    let session = sessions::lookup(&state.db, id).await?;
    Ok(Json(session))
}

/// GET /sessions/:id/name-type
pub async fn get_name_and_type(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let (name, session_type) = sessions::name_and_type(&state.db, id).await?;
    Ok(Json(json!({
        "session_name": name.as_str(),
        "session_type": session_type.as_str(),
    })))
}

/// GET /sessions/upcoming
pub async fn list_upcoming(State(state): State<AppState>) -> ApiResult<Json<Vec<Session>>> {
    let list = sessions::list_upcoming(&state.db, Utc::now()).await?;
    Ok(Json(list))
}

/// GET /sessions/past/:year
pub async fn list_past(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> ApiResult<Json<Vec<Session>>> {
    let list = sessions::list_past(&state.db, year, Utc::now()).await?;
    Ok(Json(list))
}

/// DELETE /sessions/:id
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    sessions::delete_session(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
