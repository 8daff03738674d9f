//! Database initialization
//!
//! Creates the database file on first run and brings the schema up
//! idempotently. Foreign keys are enforced at the database level; WAL mode
//! allows concurrent readers while request handlers write.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Initialize database connection pool and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(100)
        .min_connections(10)
        .max_lifetime(Duration::from_secs(600))
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    init_schema(&pool).await?;

    Ok(pool)
}

/// Apply pragmas and create all tables (idempotent, also used by tests on
/// in-memory pools)
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;
    sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(pool).await?;

    create_users_table(pool).await?;
    create_drivers_table(pool).await?;
    create_sessions_table(pool).await?;
    create_results_table(pool).await?;
    create_prode_carreras_table(pool).await?;
    create_prode_sessions_table(pool).await?;

    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            score INTEGER NOT NULL DEFAULT 0,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            deleted_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_drivers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS drivers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            driver_number INTEGER NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            full_name TEXT NOT NULL,
            name_acronym TEXT NOT NULL,
            country_code TEXT NOT NULL,
            team_name TEXT NOT NULL,
            headshot_url TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            deleted_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Driver numbers are unique among active drivers only; retired numbers
    // may be reissued
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_drivers_number_active
        ON drivers (driver_number)
        WHERE active = 1 AND deleted_at IS NULL
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            weekend_id INTEGER NOT NULL,
            circuit_key INTEGER NOT NULL,
            circuit_short_name TEXT NOT NULL,
            country_code TEXT NOT NULL,
            country_name TEXT NOT NULL,
            location TEXT NOT NULL,
            session_key INTEGER UNIQUE,
            session_name TEXT NOT NULL,
            session_type TEXT NOT NULL,
            date_start TEXT NOT NULL,
            date_end TEXT NOT NULL,
            year INTEGER NOT NULL,
            vsc INTEGER,
            sf INTEGER,
            dnf INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            deleted_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // At most one live session per (circuit, year, name, type)
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_identity
        ON sessions (circuit_key, year, session_name, session_type)
        WHERE deleted_at IS NULL
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_results_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            driver_id INTEGER REFERENCES drivers(id) ON DELETE SET NULL,
            position INTEGER,
            fastest_lap_time REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            deleted_at TEXT,
            UNIQUE (session_id, driver_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One row per finishing position; null positions (non-finishers) are
    // exempt
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_results_session_position
        ON results (session_id, position)
        WHERE position IS NOT NULL AND deleted_at IS NULL
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_prode_carreras_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS prode_carreras (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            session_id INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            p1 INTEGER NOT NULL REFERENCES drivers(id),
            p2 INTEGER NOT NULL REFERENCES drivers(id),
            p3 INTEGER NOT NULL REFERENCES drivers(id),
            p4 INTEGER NOT NULL REFERENCES drivers(id),
            p5 INTEGER NOT NULL REFERENCES drivers(id),
            vsc INTEGER NOT NULL DEFAULT 0,
            sc INTEGER NOT NULL DEFAULT 0,
            dnf INTEGER NOT NULL DEFAULT 0,
            score INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            deleted_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_prode_carreras_user_session
        ON prode_carreras (user_id, session_id)
        WHERE deleted_at IS NULL
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_prode_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS prode_sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            session_id INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            p1 INTEGER NOT NULL REFERENCES drivers(id),
            p2 INTEGER NOT NULL REFERENCES drivers(id),
            p3 INTEGER NOT NULL REFERENCES drivers(id),
            score INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            deleted_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_prode_sessions_user_session
        ON prode_sessions (user_id, session_id)
        WHERE deleted_at IS NULL
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_creation_is_idempotent() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        init_schema(&pool).await.unwrap();
        init_schema(&pool).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        for expected in [
            "drivers",
            "prode_carreras",
            "prode_sessions",
            "results",
            "sessions",
            "users",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing {expected}");
        }
    }

    #[tokio::test]
    async fn init_database_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("prediapp.db");
        let pool = init_database(&db_path).await.unwrap();
        assert!(db_path.exists());

        sqlx::query("INSERT INTO users (username) VALUES ('ayrton')")
            .execute(&pool)
            .await
            .unwrap();
        let score: i64 = sqlx::query_scalar("SELECT score FROM users WHERE username = 'ayrton'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(score, 0);
    }
}
