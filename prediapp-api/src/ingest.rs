//! Result ingestor
//!
//! Materializes canonical result rows for a session from the external
//! timing API: the last position record per driver number wins, fastest
//! lap is the minimum positive lap duration, and drivers missing from the
//! local catalog are logged and skipped. Re-running over unchanged external
//! data converges to the same rows.

use std::collections::HashMap;

use sqlx::SqlitePool;
use tracing::{info, warn};

use prediapp_common::models::SessionResult;
use prediapp_common::{Error, Result};

use crate::db::{drivers, results, sessions};
use crate::locks::SessionLocks;
use crate::openf1::TimingApi;

struct ResolvedRow {
    driver_id: i64,
    position: Option<i64>,
    fastest_lap_time: f64,
}

/// Fetch, reconcile, and upsert results for a session. Serialized per
/// session id; a concurrent attempt on the same session fails fast with
/// `Conflict`. External faults abort before anything is written, leaving
/// previously ingested rows intact.
pub async fn ingest_session(
    pool: &SqlitePool,
    locks: &SessionLocks,
    timing: &dyn TimingApi,
    session_id: i64,
) -> Result<Vec<SessionResult>> {
    let session_key = sessions::session_key(pool, session_id)
        .await?
        .ok_or_else(|| {
            Error::BadRequest(format!("session {session_id} has no session_key yet"))
        })?;

    let _guard = locks.try_acquire(session_id)?;

    let updates = timing.positions(session_key).await?;

    // The stream carries one record per position change; the last record
    // per driver number is the final classification
    let mut final_positions: HashMap<i64, Option<i64>> = HashMap::new();
    for update in &updates {
        final_positions.insert(update.driver_number, update.position);
    }

    info!(
        session_id,
        session_key,
        drivers = final_positions.len(),
        "ingesting session results"
    );

    // Resolve every driver and lap list before touching the database, so
    // the write transaction never spans a network hop
    let mut rows: Vec<ResolvedRow> = Vec::with_capacity(final_positions.len());
    for (driver_number, position) in final_positions {
        let driver = match drivers::get_driver_by_number(pool, driver_number).await? {
            Some(driver) => driver,
            None => {
                warn!(
                    driver_number,
                    session_id, "driver not in local catalog, skipping"
                );
                continue;
            }
        };

        let laps = timing.laps(session_key, driver_number).await?;
        let fastest_lap_time = laps
            .iter()
            .filter_map(|lap| lap.lap_duration)
            .filter(|d| *d > 0.0)
            .fold(0.0_f64, |best, d| {
                if best == 0.0 || d < best {
                    d
                } else {
                    best
                }
            });

        rows.push(ResolvedRow {
            driver_id: driver.id,
            position,
            fastest_lap_time,
        });
    }

    let mut tx = pool.begin().await?;
    results::clear_positions(&mut tx, session_id).await?;
    for row in &rows {
        results::upsert_result(&mut tx, session_id, row.driver_id, row.position, row.fastest_lap_time)
            .await?;
    }
    tx.commit().await?;

    info!(session_id, upserted = rows.len(), "session results ingested");

    results::list_by_session(pool, session_id).await
}
