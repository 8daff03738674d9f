//! Scoring engine
//!
//! Computes a score for every prediction bound to a session from the
//! canonical results and the session's race flags, then applies the net
//! delta to each owner's aggregate score. The whole pass for one session
//! is a single transaction under the session lock, so re-running after a
//! result or flag correction tracks user totals without double counting.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::info;

use prediapp_common::models::{RacePrediction, Session, SessionPrediction, SessionResult};
use prediapp_common::{Error, Result, ScoringRules};

use crate::db::{predictions, results, sessions, users};
use crate::locks::SessionLocks;

/// Finishing order of a session, keyed by driver
pub struct ResultsIndex {
    position_of: HashMap<i64, i64>,
}

impl ResultsIndex {
    pub fn new(rows: &[SessionResult]) -> Self {
        let mut position_of = HashMap::new();
        for row in rows {
            if let Some(position) = row.position {
                position_of.insert(row.driver_id, position);
            }
        }
        Self { position_of }
    }

    fn position_of(&self, driver_id: i64) -> Option<i64> {
        self.position_of.get(&driver_id).copied()
    }
}

/// Score the position picks shared by both variants: exact points for the
/// right driver at the right position, near points for a driver who
/// finished elsewhere inside the predicted range, zero otherwise
fn score_picks(picks: &[i64], index: &ResultsIndex, exact: &[i64], near: &[i64]) -> i64 {
    let range = picks.len() as i64;
    let mut total = 0;
    for (k, driver_id) in picks.iter().enumerate() {
        let predicted_position = (k + 1) as i64;
        match index.position_of(*driver_id) {
            Some(actual) if actual == predicted_position => total += exact[k],
            Some(actual) if actual <= range => total += near[k],
            _ => {}
        }
    }
    total
}

/// Points for a race prediction given the finishing order and the
/// session's post-hoc flags
pub fn score_race_prediction(
    prediction: &RacePrediction,
    index: &ResultsIndex,
    session: &Session,
    rules: &ScoringRules,
) -> i64 {
    let mut total = score_picks(
        &prediction.picks(),
        index,
        &rules.race_exact,
        &rules.race_near,
    );

    if session.vsc == Some(prediction.vsc) {
        total += rules.vsc_points;
    }
    if session.sf == Some(prediction.sc) {
        total += rules.sc_points;
    }
    if let Some(actual_dnf) = session.dnf {
        let diff = (actual_dnf - prediction.dnf).abs();
        if diff == 0 {
            total += rules.dnf_exact_points;
        } else if diff == 1 {
            total += rules.dnf_close_points;
        }
    }

    total
}

/// Points for a non-race prediction given the finishing order
pub fn score_session_prediction(
    prediction: &SessionPrediction,
    index: &ResultsIndex,
    rules: &ScoringRules,
) -> i64 {
    score_picks(
        &prediction.picks(),
        index,
        &rules.session_exact,
        &rules.session_near,
    )
}

/// Outcome of one scoring pass
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScoringReport {
    pub session_id: i64,
    pub predictions_scored: usize,
    pub users_updated: usize,
}

/// Score every prediction bound to a session and apply the per-user score
/// deltas, all in one transaction under the session lock. The session must
/// already be over at `now`.
pub async fn run_scoring(
    pool: &SqlitePool,
    locks: &SessionLocks,
    rules: &ScoringRules,
    session_id: i64,
    now: DateTime<Utc>,
) -> Result<ScoringReport> {
    let _guard = locks.acquire(session_id).await;

    let session = sessions::lookup(pool, session_id).await?;
    if now < session.date_end {
        return Err(Error::Conflict(format!(
            "session {session_id} has not ended yet, scoring opens at {}",
            session.date_end.to_rfc3339()
        )));
    }
    let result_rows = results::list_by_session(pool, session_id).await?;
    let index = ResultsIndex::new(&result_rows);

    let race_predictions = predictions::list_race_by_session(pool, session_id).await?;
    let session_predictions = predictions::list_session_by_session(pool, session_id).await?;

    let mut deltas: HashMap<i64, i64> = HashMap::new();
    let mut race_updates: Vec<(i64, i64)> = Vec::new();
    let mut session_updates: Vec<(i64, i64)> = Vec::new();
    let mut scored = 0usize;

    for prediction in &race_predictions {
        let new = score_race_prediction(prediction, &index, &session, rules);
        let old = prediction.score.unwrap_or(0);
        scored += 1;
        if prediction.score != Some(new) {
            race_updates.push((prediction.id, new));
            *deltas.entry(prediction.user_id).or_insert(0) += new - old;
        }
    }

    for prediction in &session_predictions {
        let new = score_session_prediction(prediction, &index, rules);
        let old = prediction.score.unwrap_or(0);
        scored += 1;
        if prediction.score != Some(new) {
            session_updates.push((prediction.id, new));
            *deltas.entry(prediction.user_id).or_insert(0) += new - old;
        }
    }

    let mut tx = pool.begin().await?;
    for (id, score) in &race_updates {
        sqlx::query(
            "UPDATE prode_carreras SET score = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(score)
        .bind(id)
        .execute(&mut *tx)
        .await?;
    }
    for (id, score) in &session_updates {
        sqlx::query(
            "UPDATE prode_sessions SET score = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(score)
        .bind(id)
        .execute(&mut *tx)
        .await?;
    }

    let users_updated = deltas.iter().filter(|(_, delta)| **delta != 0).count();
    for (user_id, delta) in deltas {
        users::apply_score_delta(&mut tx, user_id, delta).await?;
    }
    tx.commit().await?;

    info!(
        session_id,
        predictions_scored = scored,
        users_updated,
        "scoring pass complete"
    );

    Ok(ScoringReport {
        session_id,
        predictions_scored: scored,
        users_updated,
    })
}
