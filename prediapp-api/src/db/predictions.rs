//! Prediction store
//!
//! Persists both prediction variants and enforces the write rules: variant
//! match against the referenced session, one prediction per (user, session),
//! strict prediction window, known and duplicate-free driver picks, and
//! ownership on update and delete. Deletes are soft; deleting a scored
//! prediction reverses its score contribution in the same transaction.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{Row, SqlitePool};

use prediapp_common::models::{Prediction, RacePrediction, Session, SessionPrediction};
use prediapp_common::{Error, Result};

use crate::db::{drivers, sessions, users};
use crate::locks::SessionLocks;

/// Incoming race prediction payload
#[derive(Debug, Clone, Deserialize)]
pub struct RacePredictionDraft {
    pub user_id: i64,
    pub session_id: i64,
    pub p1: i64,
    pub p2: i64,
    pub p3: i64,
    pub p4: i64,
    pub p5: i64,
    pub vsc: bool,
    pub sc: bool,
    pub dnf: i64,
}

/// Incoming non-race prediction payload
#[derive(Debug, Clone, Deserialize)]
pub struct SessionPredictionDraft {
    pub user_id: i64,
    pub session_id: i64,
    pub p1: i64,
    pub p2: i64,
    pub p3: i64,
}

fn row_to_race(row: &sqlx::sqlite::SqliteRow) -> RacePrediction {
    RacePrediction {
        id: row.get("id"),
        user_id: row.get("user_id"),
        session_id: row.get("session_id"),
        p1: row.get("p1"),
        p2: row.get("p2"),
        p3: row.get("p3"),
        p4: row.get("p4"),
        p5: row.get("p5"),
        vsc: row.get("vsc"),
        sc: row.get("sc"),
        dnf: row.get("dnf"),
        score: row.get("score"),
    }
}

fn row_to_session_pred(row: &sqlx::sqlite::SqliteRow) -> SessionPrediction {
    SessionPrediction {
        id: row.get("id"),
        user_id: row.get("user_id"),
        session_id: row.get("session_id"),
        p1: row.get("p1"),
        p2: row.get("p2"),
        p3: row.get("p3"),
        score: row.get("score"),
    }
}

fn ensure_distinct_picks(picks: &[i64]) -> Result<()> {
    for (i, a) in picks.iter().enumerate() {
        if picks[i + 1..].contains(a) {
            return Err(Error::BadRequest(format!(
                "driver {a} appears more than once in the prediction"
            )));
        }
    }
    Ok(())
}

/// Shared write-gate: the referenced session must exist, match the wanted
/// variant, and still have its prediction window open
async fn session_gate(
    pool: &SqlitePool,
    session_id: i64,
    want_race: bool,
    now: DateTime<Utc>,
) -> Result<Session> {
    let session = sessions::lookup(pool, session_id).await?;
    match (want_race, session.is_race()) {
        (true, false) => {
            return Err(Error::VariantMismatch(format!(
                "session {session_id} is '{}', race predictions require a Race session",
                session.session_name.as_str()
            )))
        }
        (false, true) => {
            return Err(Error::VariantMismatch(format!(
                "session {session_id} is a Race, use a race prediction instead"
            )))
        }
        _ => {}
    }
    if !session.prediction_window_open(now) {
        return Err(Error::Forbidden(format!(
            "prediction window for session {session_id} closed at {}",
            session.date_start.to_rfc3339()
        )));
    }
    Ok(session)
}

async fn ensure_no_existing(pool: &SqlitePool, user_id: i64, session_id: i64) -> Result<()> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT (SELECT COUNT(*) FROM prode_carreras
                WHERE user_id = ?1 AND session_id = ?2 AND deleted_at IS NULL)
             + (SELECT COUNT(*) FROM prode_sessions
                WHERE user_id = ?1 AND session_id = ?2 AND deleted_at IS NULL)
        "#,
    )
    .bind(user_id)
    .bind(session_id)
    .fetch_one(pool)
    .await?;

    if count > 0 {
        return Err(Error::Conflict(format!(
            "user {user_id} already has a prediction for session {session_id}"
        )));
    }
    Ok(())
}

/// Create a race prediction
pub async fn create_race_prediction(
    pool: &SqlitePool,
    draft: RacePredictionDraft,
    now: DateTime<Utc>,
) -> Result<RacePrediction> {
    session_gate(pool, draft.session_id, true, now).await?;
    users::get_user(pool, draft.user_id).await?;
    let picks = [draft.p1, draft.p2, draft.p3, draft.p4, draft.p5];
    ensure_distinct_picks(&picks)?;
    drivers::ensure_drivers_exist(pool, &picks).await?;
    ensure_no_existing(pool, draft.user_id, draft.session_id).await?;

    let result = sqlx::query(
        r#"
        INSERT INTO prode_carreras (user_id, session_id, p1, p2, p3, p4, p5, vsc, sc, dnf)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(draft.user_id)
    .bind(draft.session_id)
    .bind(draft.p1)
    .bind(draft.p2)
    .bind(draft.p3)
    .bind(draft.p4)
    .bind(draft.p5)
    .bind(draft.vsc)
    .bind(draft.sc)
    .bind(draft.dnf)
    .execute(pool)
    .await
    .map_err(|e| {
        super::map_unique_violation(e, "a prediction for this user and session already exists")
    })?;

    get_race_prediction(pool, result.last_insert_rowid()).await
}

/// Create a non-race prediction
pub async fn create_session_prediction(
    pool: &SqlitePool,
    draft: SessionPredictionDraft,
    now: DateTime<Utc>,
) -> Result<SessionPrediction> {
    session_gate(pool, draft.session_id, false, now).await?;
    users::get_user(pool, draft.user_id).await?;
    let picks = [draft.p1, draft.p2, draft.p3];
    ensure_distinct_picks(&picks)?;
    drivers::ensure_drivers_exist(pool, &picks).await?;
    ensure_no_existing(pool, draft.user_id, draft.session_id).await?;

    let result = sqlx::query(
        r#"
        INSERT INTO prode_sessions (user_id, session_id, p1, p2, p3)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(draft.user_id)
    .bind(draft.session_id)
    .bind(draft.p1)
    .bind(draft.p2)
    .bind(draft.p3)
    .execute(pool)
    .await
    .map_err(|e| {
        super::map_unique_violation(e, "a prediction for this user and session already exists")
    })?;

    get_session_prediction(pool, result.last_insert_rowid()).await
}

/// Update an owned race prediction while its window is open
pub async fn update_race_prediction(
    pool: &SqlitePool,
    id: i64,
    draft: RacePredictionDraft,
    now: DateTime<Utc>,
) -> Result<RacePrediction> {
    let existing = get_race_prediction(pool, id).await?;
    if existing.user_id != draft.user_id {
        return Err(Error::Forbidden(format!(
            "prediction {id} belongs to another user"
        )));
    }
    if draft.session_id != existing.session_id {
        return Err(Error::BadRequest(format!(
            "prediction {id} is bound to session {}",
            existing.session_id
        )));
    }
    session_gate(pool, existing.session_id, true, now).await?;
    let picks = [draft.p1, draft.p2, draft.p3, draft.p4, draft.p5];
    ensure_distinct_picks(&picks)?;
    drivers::ensure_drivers_exist(pool, &picks).await?;

    sqlx::query(
        r#"
        UPDATE prode_carreras SET
            p1 = ?, p2 = ?, p3 = ?, p4 = ?, p5 = ?,
            vsc = ?, sc = ?, dnf = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(draft.p1)
    .bind(draft.p2)
    .bind(draft.p3)
    .bind(draft.p4)
    .bind(draft.p5)
    .bind(draft.vsc)
    .bind(draft.sc)
    .bind(draft.dnf)
    .bind(id)
    .execute(pool)
    .await?;

    get_race_prediction(pool, id).await
}

/// Update an owned non-race prediction while its window is open
pub async fn update_session_prediction(
    pool: &SqlitePool,
    id: i64,
    draft: SessionPredictionDraft,
    now: DateTime<Utc>,
) -> Result<SessionPrediction> {
    let existing = get_session_prediction(pool, id).await?;
    if existing.user_id != draft.user_id {
        return Err(Error::Forbidden(format!(
            "prediction {id} belongs to another user"
        )));
    }
    if draft.session_id != existing.session_id {
        return Err(Error::BadRequest(format!(
            "prediction {id} is bound to session {}",
            existing.session_id
        )));
    }
    session_gate(pool, existing.session_id, false, now).await?;
    let picks = [draft.p1, draft.p2, draft.p3];
    ensure_distinct_picks(&picks)?;
    drivers::ensure_drivers_exist(pool, &picks).await?;

    sqlx::query(
        r#"
        UPDATE prode_sessions SET
            p1 = ?, p2 = ?, p3 = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(draft.p1)
    .bind(draft.p2)
    .bind(draft.p3)
    .bind(id)
    .execute(pool)
    .await?;

    get_session_prediction(pool, id).await
}

/// Soft-delete an owned prediction, discriminating variant via the stored
/// rows. A scored prediction reverses its contribution to the owner's
/// aggregate inside the same transaction, serialized against the scoring
/// engine by the session lock.
pub async fn delete_prediction(
    pool: &SqlitePool,
    locks: &SessionLocks,
    id: i64,
    user_id: i64,
) -> Result<()> {
    // First read only locates the session whose lock serializes this delete
    let prediction = find_prediction(pool, id).await?;
    let _guard = locks.acquire(prediction.session_id()).await;

    // Re-read under the lock: a concurrent delete may have removed the row,
    // and a scoring pass may have changed its score
    let prediction = find_prediction(pool, id).await?;
    if prediction.user_id() != user_id {
        return Err(Error::Forbidden(format!(
            "prediction {id} belongs to another user"
        )));
    }

    let table = match &prediction {
        Prediction::Race(_) => "prode_carreras",
        Prediction::Session(_) => "prode_sessions",
    };

    let mut tx = pool.begin().await?;

    let result = sqlx::query(&format!(
        "UPDATE {table} SET deleted_at = CURRENT_TIMESTAMP, \
         updated_at = CURRENT_TIMESTAMP WHERE id = ? AND deleted_at IS NULL"
    ))
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("prediction {id} not found")));
    }

    if let Some(score) = prediction.score() {
        users::apply_score_delta(&mut tx, user_id, -score).await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Locate a live prediction of either variant by id
pub async fn find_prediction(pool: &SqlitePool, id: i64) -> Result<Prediction> {
    if let Ok(race) = get_race_prediction(pool, id).await {
        return Ok(Prediction::Race(race));
    }
    match get_session_prediction(pool, id).await {
        Ok(session) => Ok(Prediction::Session(session)),
        Err(_) => Err(Error::NotFound(format!("prediction {id} not found"))),
    }
}

pub async fn get_race_prediction(pool: &SqlitePool, id: i64) -> Result<RacePrediction> {
    let row = sqlx::query(
        "SELECT id, user_id, session_id, p1, p2, p3, p4, p5, vsc, sc, dnf, score \
         FROM prode_carreras WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(|r| row_to_race(&r))
        .ok_or_else(|| Error::NotFound(format!("race prediction {id} not found")))
}

pub async fn get_session_prediction(pool: &SqlitePool, id: i64) -> Result<SessionPrediction> {
    let row = sqlx::query(
        "SELECT id, user_id, session_id, p1, p2, p3, score \
         FROM prode_sessions WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(|r| row_to_session_pred(&r))
        .ok_or_else(|| Error::NotFound(format!("session prediction {id} not found")))
}

/// Both variants of a user's live predictions
pub async fn list_by_user(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<(Vec<RacePrediction>, Vec<SessionPrediction>)> {
    let race_rows = sqlx::query(
        "SELECT id, user_id, session_id, p1, p2, p3, p4, p5, vsc, sc, dnf, score \
         FROM prode_carreras WHERE user_id = ? AND deleted_at IS NULL ORDER BY id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let session_rows = sqlx::query(
        "SELECT id, user_id, session_id, p1, p2, p3, score \
         FROM prode_sessions WHERE user_id = ? AND deleted_at IS NULL ORDER BY id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok((
        race_rows.iter().map(row_to_race).collect(),
        session_rows.iter().map(row_to_session_pred).collect(),
    ))
}

/// All live race predictions bound to a session
pub async fn list_race_by_session(
    pool: &SqlitePool,
    session_id: i64,
) -> Result<Vec<RacePrediction>> {
    let rows = sqlx::query(
        "SELECT id, user_id, session_id, p1, p2, p3, p4, p5, vsc, sc, dnf, score \
         FROM prode_carreras WHERE session_id = ? AND deleted_at IS NULL ORDER BY id",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(row_to_race).collect())
}

/// All live non-race predictions bound to a session
pub async fn list_session_by_session(
    pool: &SqlitePool,
    session_id: i64,
) -> Result<Vec<SessionPrediction>> {
    let rows = sqlx::query(
        "SELECT id, user_id, session_id, p1, p2, p3, score \
         FROM prode_sessions WHERE session_id = ? AND deleted_at IS NULL ORDER BY id",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(row_to_session_pred).collect())
}

/// A user's live prediction for a session, whichever variant it is
pub async fn get_by_user_and_session(
    pool: &SqlitePool,
    user_id: i64,
    session_id: i64,
) -> Result<Prediction> {
    let race = sqlx::query(
        "SELECT id, user_id, session_id, p1, p2, p3, p4, p5, vsc, sc, dnf, score \
         FROM prode_carreras \
         WHERE user_id = ? AND session_id = ? AND deleted_at IS NULL",
    )
    .bind(user_id)
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    if let Some(row) = race {
        return Ok(Prediction::Race(row_to_race(&row)));
    }

    let session = sqlx::query(
        "SELECT id, user_id, session_id, p1, p2, p3, score \
         FROM prode_sessions \
         WHERE user_id = ? AND session_id = ? AND deleted_at IS NULL",
    )
    .bind(user_id)
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    session
        .map(|r| Prediction::Session(row_to_session_pred(&r)))
        .ok_or_else(|| {
            Error::NotFound(format!(
                "no prediction for user {user_id} and session {session_id}"
            ))
        })
}
