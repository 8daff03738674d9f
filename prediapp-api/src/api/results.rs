//! Result and scoring endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;

use prediapp_common::models::SessionResult;

use crate::db::results;
use crate::error::ApiResult;
use crate::scoring::{self, ScoringReport};
use crate::{ingest, AppState};

/// GET /results/api/:session_id
///
/// Triggers ingestion from the timing API and returns the materialized
/// rows.
pub async fn ingest_results(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> ApiResult<Json<Vec<SessionResult>>> {
    let rows =
        ingest::ingest_session(&state.db, &state.locks, state.timing.as_ref(), session_id)
            .await?;
    Ok(Json(rows))
}

/// GET /results/session/:session_id
pub async fn list_results(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> ApiResult<Json<Vec<SessionResult>>> {
    let rows = results::list_by_session(&state.db, session_id).await?;
    Ok(Json(rows))
}

/// GET /results/session/:session_id/fastest-lap
pub async fn fastest_lap(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> ApiResult<Json<SessionResult>> {
    let row = results::fastest_lap(&state.db, session_id).await?;
    Ok(Json(row))
}

/// POST /results/score/:session_id
///
/// Runs the scoring engine for a session; safe to re-run after result or
/// flag corrections.
pub async fn score_session(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> ApiResult<Json<ScoringReport>> {
    let report =
        scoring::run_scoring(&state.db, &state.locks, &state.rules, session_id, Utc::now())
            .await?;
    Ok(Json(report))
}
