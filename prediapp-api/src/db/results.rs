//! Canonical session results
//!
//! One row per (session, driver), owned by the result ingestor. Re-ingestion
//! updates rows in place; user actions never touch this table.

use sqlx::{Row, Sqlite, SqlitePool};

use prediapp_common::models::SessionResult;
use prediapp_common::{Error, Result};

fn row_to_result(row: &sqlx::sqlite::SqliteRow) -> SessionResult {
    SessionResult {
        id: row.get("id"),
        session_id: row.get("session_id"),
        driver_id: row.get("driver_id"),
        position: row.get("position"),
        fastest_lap_time: row.get("fastest_lap_time"),
    }
}

/// Null out every stored position for a session before a re-ingest batch,
/// so drivers swapping positions cannot trip the per-position unique index
/// mid-batch
pub async fn clear_positions(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    session_id: i64,
) -> Result<()> {
    sqlx::query("UPDATE results SET position = NULL WHERE session_id = ?")
        .bind(session_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Insert or update the result row for (session, driver)
pub async fn upsert_result(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    session_id: i64,
    driver_id: i64,
    position: Option<i64>,
    fastest_lap_time: f64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO results (session_id, driver_id, position, fastest_lap_time)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(session_id, driver_id) DO UPDATE SET
            position = excluded.position,
            fastest_lap_time = excluded.fastest_lap_time,
            deleted_at = NULL,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(session_id)
    .bind(driver_id)
    .bind(position)
    .bind(fastest_lap_time)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Results for a session ordered by position, non-finishers last
pub async fn list_by_session(pool: &SqlitePool, session_id: i64) -> Result<Vec<SessionResult>> {
    let rows = sqlx::query(
        r#"
        SELECT id, session_id, driver_id, position, fastest_lap_time
        FROM results
        WHERE session_id = ? AND driver_id IS NOT NULL AND deleted_at IS NULL
        ORDER BY position IS NULL, position
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(row_to_result).collect())
}

/// The result row holding the fastest valid lap of the session
pub async fn fastest_lap(pool: &SqlitePool, session_id: i64) -> Result<SessionResult> {
    let row = sqlx::query(
        r#"
        SELECT id, session_id, driver_id, position, fastest_lap_time
        FROM results
        WHERE session_id = ? AND driver_id IS NOT NULL AND deleted_at IS NULL
              AND fastest_lap_time > 0
        ORDER BY fastest_lap_time
        LIMIT 1
        "#,
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    row.map(|r| row_to_result(&r)).ok_or_else(|| {
        Error::NotFound(format!("no timed laps recorded for session {session_id}"))
    })
}
