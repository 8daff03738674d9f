//! Session registry
//!
//! Authoritative catalog of race-weekend sessions. Provides the temporal
//! gate for prediction writes and the external `session_key` the result
//! ingestor resolves against the timing API.

use chrono::{DateTime, Datelike, Utc};
use serde::Deserialize;
use sqlx::{Row, SqlitePool};

use prediapp_common::models::{validate_name_type_pair, Session, SessionName, SessionType};
use prediapp_common::{Error, Result};

use super::map_unique_violation;

/// Incoming session payload, shared by create and update
#[derive(Debug, Clone, Deserialize)]
pub struct SessionDraft {
    pub weekend_id: i64,
    pub circuit_key: i64,
    pub circuit_short_name: String,
    pub country_code: String,
    pub country_name: String,
    pub location: String,
    pub session_key: Option<i64>,
    pub session_name: SessionName,
    pub session_type: SessionType,
    pub date_start: DateTime<Utc>,
    pub date_end: DateTime<Utc>,
    pub year: i32,
    pub vsc: Option<bool>,
    pub sf: Option<bool>,
    pub dnf: Option<i64>,
}

impl SessionDraft {
    /// Validate the name/type pair and the timing window; strip race-only
    /// flags from non-race sessions
    fn validated(mut self) -> Result<Self> {
        validate_name_type_pair(self.session_name, self.session_type)?;
        if self.date_end < self.date_start {
            return Err(Error::BadRequest(
                "date_end must not precede date_start".to_string(),
            ));
        }
        if self.session_name != SessionName::Race {
            self.vsc = None;
            self.sf = None;
            self.dnf = None;
        }
        Ok(self)
    }
}

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<Session> {
    let name: String = row.get("session_name");
    let session_type: String = row.get("session_type");
    Ok(Session {
        id: row.get("id"),
        weekend_id: row.get("weekend_id"),
        circuit_key: row.get("circuit_key"),
        circuit_short_name: row.get("circuit_short_name"),
        country_code: row.get("country_code"),
        country_name: row.get("country_name"),
        location: row.get("location"),
        session_key: row.get("session_key"),
        session_name: SessionName::parse(&name)
            .map_err(|_| Error::Internal(format!("corrupt session_name: {name}")))?,
        session_type: SessionType::parse(&session_type)
            .map_err(|_| Error::Internal(format!("corrupt session_type: {session_type}")))?,
        date_start: row.get("date_start"),
        date_end: row.get("date_end"),
        year: row.get("year"),
        vsc: row.get::<Option<bool>, _>("vsc"),
        sf: row.get::<Option<bool>, _>("sf"),
        dnf: row.get("dnf"),
    })
}

const SESSION_COLUMNS: &str = "id, weekend_id, circuit_key, circuit_short_name, country_code, \
     country_name, location, session_key, session_name, session_type, \
     date_start, date_end, year, vsc, sf, dnf";

/// Create a session
pub async fn create_session(pool: &SqlitePool, draft: SessionDraft) -> Result<Session> {
    let draft = draft.validated()?;

    let result = sqlx::query(
        r#"
        INSERT INTO sessions (
            weekend_id, circuit_key, circuit_short_name, country_code,
            country_name, location, session_key, session_name, session_type,
            date_start, date_end, year, vsc, sf, dnf
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(draft.weekend_id)
    .bind(draft.circuit_key)
    .bind(&draft.circuit_short_name)
    .bind(&draft.country_code)
    .bind(&draft.country_name)
    .bind(&draft.location)
    .bind(draft.session_key)
    .bind(draft.session_name.as_str())
    .bind(draft.session_type.as_str())
    .bind(draft.date_start)
    .bind(draft.date_end)
    .bind(draft.year)
    .bind(draft.vsc)
    .bind(draft.sf)
    .bind(draft.dnf)
    .execute(pool)
    .await
    .map_err(|e| {
        map_unique_violation(
            e,
            "a session with this circuit, year, name, and type (or this session_key) already exists",
        )
    })?;

    lookup(pool, result.last_insert_rowid()).await
}

/// Update a session in place
pub async fn update_session(pool: &SqlitePool, id: i64, draft: SessionDraft) -> Result<Session> {
    let draft = draft.validated()?;

    let result = sqlx::query(
        r#"
        UPDATE sessions SET
            weekend_id = ?, circuit_key = ?, circuit_short_name = ?,
            country_code = ?, country_name = ?, location = ?, session_key = ?,
            session_name = ?, session_type = ?, date_start = ?, date_end = ?,
            year = ?, vsc = ?, sf = ?, dnf = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(draft.weekend_id)
    .bind(draft.circuit_key)
    .bind(&draft.circuit_short_name)
    .bind(&draft.country_code)
    .bind(&draft.country_name)
    .bind(&draft.location)
    .bind(draft.session_key)
    .bind(draft.session_name.as_str())
    .bind(draft.session_type.as_str())
    .bind(draft.date_start)
    .bind(draft.date_end)
    .bind(draft.year)
    .bind(draft.vsc)
    .bind(draft.sf)
    .bind(draft.dnf)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| {
        map_unique_violation(
            e,
            "a session with this circuit, year, name, and type (or this session_key) already exists",
        )
    })?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("session {id} not found")));
    }
    lookup(pool, id).await
}

/// Look up a session by id
pub async fn lookup(pool: &SqlitePool, id: i64) -> Result<Session> {
    let row = sqlx::query(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ? AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => row_to_session(&row),
        None => Err(Error::NotFound(format!("session {id} not found"))),
    }
}

/// Name and type of a session, used to select the prediction variant
pub async fn name_and_type(pool: &SqlitePool, id: i64) -> Result<(SessionName, SessionType)> {
    let session = lookup(pool, id).await?;
    Ok((session.session_name, session.session_type))
}

/// External timing API key of a session; empty until an admin populates it
pub async fn session_key(pool: &SqlitePool, id: i64) -> Result<Option<i64>> {
    let session = lookup(pool, id).await?;
    Ok(session.session_key)
}

/// Sessions whose start lies strictly in the future, current year only
pub async fn list_upcoming(pool: &SqlitePool, now: DateTime<Utc>) -> Result<Vec<Session>> {
    let rows = sqlx::query(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions \
         WHERE deleted_at IS NULL AND date_start > ? AND year = ? \
         ORDER BY date_start"
    ))
    .bind(now)
    .bind(now.year())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_session).collect()
}

/// Sessions of a given year whose start is already past
pub async fn list_past(
    pool: &SqlitePool,
    year: i32,
    now: DateTime<Utc>,
) -> Result<Vec<Session>> {
    let rows = sqlx::query(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions \
         WHERE deleted_at IS NULL AND date_start < ? AND year = ? \
         ORDER BY date_start DESC"
    ))
    .bind(now)
    .bind(year)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_session).collect()
}

/// True iff predictions on the session may still be written at `now`
pub async fn is_prediction_window_open(
    pool: &SqlitePool,
    id: i64,
    now: DateTime<Utc>,
) -> Result<bool> {
    let session = lookup(pool, id).await?;
    Ok(session.prediction_window_open(now))
}

/// Delete a session: hard delete when nothing references it, soft delete
/// otherwise
pub async fn delete_session(pool: &SqlitePool, id: i64) -> Result<()> {
    lookup(pool, id).await?;

    let referenced: i64 = sqlx::query_scalar(
        r#"
        SELECT (SELECT COUNT(*) FROM prode_carreras WHERE session_id = ?1)
             + (SELECT COUNT(*) FROM prode_sessions WHERE session_id = ?1)
             + (SELECT COUNT(*) FROM results WHERE session_id = ?1)
        "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await?;

    if referenced == 0 {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
    } else {
        sqlx::query(
            "UPDATE sessions SET deleted_at = CURRENT_TIMESTAMP, \
             updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(id)
        .execute(pool)
        .await?;
    }
    Ok(())
}
