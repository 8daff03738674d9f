//! User score maintenance
//!
//! Account management lives in the users service; this module reads user
//! rows and applies aggregate score deltas when predictions are scored,
//! rescored, or deleted.

use sqlx::{Row, Sqlite, SqlitePool};

use prediapp_common::models::User;
use prediapp_common::{Error, Result};

/// Look up a user by id
pub async fn get_user(pool: &SqlitePool, id: i64) -> Result<User> {
    let row = sqlx::query(
        "SELECT id, username, score, active FROM users WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(User {
            id: row.get("id"),
            username: row.get("username"),
            score: row.get("score"),
            active: row.get("active"),
        }),
        None => Err(Error::NotFound(format!("user {id} not found"))),
    }
}

/// Adjust a user's aggregate score by a delta, inside the caller's
/// transaction
pub async fn apply_score_delta(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    user_id: i64,
    delta: i64,
) -> Result<()> {
    if delta == 0 {
        return Ok(());
    }
    sqlx::query(
        "UPDATE users SET score = score + ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(delta)
    .bind(user_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[cfg(test)]
pub async fn insert_user(pool: &SqlitePool, username: &str) -> Result<i64> {
    let result = sqlx::query("INSERT INTO users (username) VALUES (?)")
        .bind(username)
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}
