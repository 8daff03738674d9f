//! prediapp-api library - prediction lifecycle and scoring core
//!
//! One service owning the session registry, prediction store, result
//! ingestor, and scoring engine over a shared SQLite store.

use std::sync::Arc;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use sqlx::SqlitePool;
use tower::{timeout::TimeoutLayer, BoxError, ServiceBuilder};
use tower_http::trace::TraceLayer;

use prediapp_common::ScoringRules;

pub mod api;
pub mod db;
pub mod error;
pub mod ingest;
pub mod locks;
pub mod openf1;
pub mod scoring;

use error::ApiError;
use locks::SessionLocks;
use openf1::TimingApi;

/// Request deadline; slower handlers surface `Timeout`
const REQUEST_DEADLINE: Duration = Duration::from_secs(30);

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Immutable scoring rule table loaded at startup
    pub rules: Arc<ScoringRules>,
    /// Per-session lock registry for ingestion, scoring, and scored writes
    pub locks: SessionLocks,
    /// External timing API client
    pub timing: Arc<dyn TimingApi>,
}

impl AppState {
    pub fn new(db: SqlitePool, rules: ScoringRules, timing: Arc<dyn TimingApi>) -> Self {
        Self {
            db,
            rules: Arc::new(rules),
            locks: SessionLocks::new(),
            timing,
        }
    }
}

async fn handle_middleware_error(err: BoxError) -> ApiError {
    if err.is::<tower::timeout::error::Elapsed>() {
        ApiError::from(prediapp_common::Error::Timeout(
            "request deadline exceeded".to_string(),
        ))
    } else {
        ApiError::from(prediapp_common::Error::Internal(err.to_string()))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/prodes/carrera", post(api::prodes::create_race_prediction))
        .route("/prodes/session", post(api::prodes::create_session_prediction))
        .route("/prodes/carrera/:id", put(api::prodes::update_race_prediction))
        .route(
            "/prodes/session/:id",
            put(api::prodes::update_session_prediction)
                .get(api::prodes::list_session_by_session),
        )
        .route("/prodes/:id", delete(api::prodes::delete_prediction))
        .route("/prodes/user/:user_id", get(api::prodes::list_by_user))
        .route(
            "/prodes/user/:user_id/session/:session_id",
            get(api::prodes::get_by_user_and_session),
        )
        .route(
            "/prodes/carrera/session/:session_id",
            get(api::prodes::list_race_by_session),
        )
        .route("/results/api/:session_id", get(api::results::ingest_results))
        .route("/results/session/:session_id", get(api::results::list_results))
        .route(
            "/results/session/:session_id/fastest-lap",
            get(api::results::fastest_lap),
        )
        .route("/results/score/:session_id", post(api::results::score_session))
        .route("/sessions", post(api::sessions::create_session))
        .route(
            "/sessions/:id",
            get(api::sessions::get_session)
                .put(api::sessions::update_session)
                .delete(api::sessions::delete_session),
        )
        .route("/sessions/:id/name-type", get(api::sessions::get_name_and_type))
        .route("/sessions/upcoming", get(api::sessions::list_upcoming))
        .route("/sessions/past/:year", get(api::sessions::list_past))
        .route("/health", get(api::health::health))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .layer(TimeoutLayer::new(REQUEST_DEADLINE)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
