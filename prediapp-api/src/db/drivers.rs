//! Driver catalog access
//!
//! Read side of the driver catalog used by prediction validation and the
//! result ingestor. Bootstrap from the external catalog happens outside
//! this service; `save_driver` exists for that path and for test fixtures.

use sqlx::{Row, SqlitePool};

use prediapp_common::models::Driver;
use prediapp_common::{Error, Result};

use super::map_unique_violation;

fn row_to_driver(row: &sqlx::sqlite::SqliteRow) -> Driver {
    Driver {
        id: row.get("id"),
        driver_number: row.get("driver_number"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        full_name: row.get("full_name"),
        name_acronym: row.get("name_acronym"),
        country_code: row.get("country_code"),
        team_name: row.get("team_name"),
        headshot_url: row.get("headshot_url"),
        active: row.get("active"),
    }
}

const DRIVER_COLUMNS: &str = "id, driver_number, first_name, last_name, full_name, \
     name_acronym, country_code, team_name, headshot_url, active";

/// Look up a driver by internal id
pub async fn get_driver(pool: &SqlitePool, id: i64) -> Result<Driver> {
    let row = sqlx::query(&format!(
        "SELECT {DRIVER_COLUMNS} FROM drivers WHERE id = ? AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(row_to_driver(&row)),
        None => Err(Error::NotFound(format!("driver {id} not found"))),
    }
}

/// Resolve an active driver by car number, as reported by the timing API
pub async fn get_driver_by_number(pool: &SqlitePool, number: i64) -> Result<Option<Driver>> {
    let row = sqlx::query(&format!(
        "SELECT {DRIVER_COLUMNS} FROM drivers \
         WHERE driver_number = ? AND active = 1 AND deleted_at IS NULL"
    ))
    .bind(number)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| row_to_driver(&r)))
}

/// Verify that every referenced driver id exists
pub async fn ensure_drivers_exist(pool: &SqlitePool, ids: &[i64]) -> Result<()> {
    for id in ids {
        let exists: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM drivers WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_one(pool)
        .await?;
        if exists == 0 {
            return Err(Error::BadRequest(format!("unknown driver id {id}")));
        }
    }
    Ok(())
}

/// Insert a driver from the bootstrap catalog
pub async fn save_driver(pool: &SqlitePool, driver: &Driver) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO drivers (
            driver_number, first_name, last_name, full_name, name_acronym,
            country_code, team_name, headshot_url, active
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(driver.driver_number)
    .bind(&driver.first_name)
    .bind(&driver.last_name)
    .bind(&driver.full_name)
    .bind(&driver.name_acronym)
    .bind(&driver.country_code)
    .bind(&driver.team_name)
    .bind(&driver.headshot_url)
    .bind(driver.active)
    .execute(pool)
    .await
    .map_err(|e| {
        map_unique_violation(
            e,
            "an active driver with this driver number already exists",
        )
    })?;

    Ok(result.last_insert_rowid())
}
