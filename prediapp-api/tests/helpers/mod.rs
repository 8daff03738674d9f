//! Shared fixtures for prediapp-api integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use prediapp_api::db::{drivers, sessions};
use prediapp_api::openf1::{Lap, PositionUpdate, TimingApi};
use prediapp_common::models::{Driver, SessionName, SessionType};
use prediapp_common::{Error, Result};

/// In-memory pool with the production schema applied. A single connection
/// keeps the in-memory database shared across concurrent tasks.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    prediapp_common::db::init_schema(&pool)
        .await
        .expect("Failed to initialize schema");
    pool
}

pub fn race_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 14, 0, 0).unwrap()
}

/// A moment well inside the prediction window of `race_start`
pub fn before_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 20, 10, 0, 0).unwrap()
}

pub fn session_draft(
    circuit_key: i64,
    name: SessionName,
    session_type: SessionType,
    session_key: Option<i64>,
) -> sessions::SessionDraft {
    sessions::SessionDraft {
        weekend_id: 1,
        circuit_key,
        circuit_short_name: "Spielberg".into(),
        country_code: "AUT".into(),
        country_name: "Austria".into(),
        location: "Spielberg".into(),
        session_key,
        session_name: name,
        session_type,
        date_start: race_start(),
        date_end: race_start() + chrono::Duration::hours(2),
        year: 2025,
        vsc: None,
        sf: None,
        dnf: None,
    }
}

/// Create a Race session with a session_key, returning its id
pub async fn seed_race_session(pool: &SqlitePool) -> i64 {
    sessions::create_session(
        pool,
        session_draft(7, SessionName::Race, SessionType::Race, Some(9001)),
    )
    .await
    .expect("Failed to create race session")
    .id
}

/// Insert `count` drivers with car numbers 1..=count, returning their ids
/// in number order
pub async fn seed_drivers(pool: &SqlitePool, count: i64) -> Vec<i64> {
    let mut ids = Vec::new();
    for number in 1..=count {
        let driver = Driver {
            id: 0,
            driver_number: number,
            first_name: "Driver".into(),
            last_name: format!("Number{number}"),
            full_name: format!("Driver Number{number}"),
            name_acronym: format!("D{number:02}"),
            country_code: "XXX".into(),
            team_name: "Test Racing".into(),
            headshot_url: None,
            active: true,
        };
        ids.push(drivers::save_driver(pool, &driver).await.unwrap());
    }
    ids
}

pub async fn seed_user(pool: &SqlitePool, username: &str) -> i64 {
    sqlx::query("INSERT INTO users (username) VALUES (?)")
        .bind(username)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub async fn user_score(pool: &SqlitePool, user_id: i64) -> i64 {
    sqlx::query_scalar("SELECT score FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Canned timing API fed from recorded position and lap data
#[derive(Default)]
pub struct StubTimingApi {
    positions: Mutex<HashMap<i64, Vec<PositionUpdate>>>,
    laps: Mutex<HashMap<(i64, i64), Vec<Lap>>>,
}

impl StubTimingApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_positions(&self, session_key: i64, updates: Vec<(i64, Option<i64>)>) {
        let updates = updates
            .into_iter()
            .map(|(driver_number, position)| PositionUpdate {
                driver_number,
                position,
                date: None,
            })
            .collect();
        self.positions
            .lock()
            .unwrap()
            .insert(session_key, updates);
    }

    pub fn set_laps(&self, session_key: i64, driver_number: i64, durations: Vec<f64>) {
        let laps = durations
            .into_iter()
            .enumerate()
            .map(|(i, lap_duration)| Lap {
                lap_number: Some(i as i64 + 1),
                lap_duration: Some(lap_duration),
            })
            .collect();
        self.laps
            .lock()
            .unwrap()
            .insert((session_key, driver_number), laps);
    }
}

#[async_trait]
impl TimingApi for StubTimingApi {
    async fn positions(&self, session_key: i64) -> Result<Vec<PositionUpdate>> {
        self.positions
            .lock()
            .unwrap()
            .get(&session_key)
            .cloned()
            .ok_or_else(|| Error::BadGateway(format!("no data for session_key {session_key}")))
    }

    async fn laps(&self, session_key: i64, driver_number: i64) -> Result<Vec<Lap>> {
        Ok(self
            .laps
            .lock()
            .unwrap()
            .get(&(session_key, driver_number))
            .cloned()
            .unwrap_or_default())
    }
}
