//! Scoring engine: end-to-end scoring, rescoring after corrections,
//! idempotence, and score reversal on deletion

mod helpers;

use helpers::*;
use prediapp_api::db::{predictions, sessions};
use prediapp_api::ingest;
use prediapp_api::locks::SessionLocks;
use prediapp_api::scoring;
use prediapp_common::models::{SessionName, SessionType};
use prediapp_common::{Error, ScoringRules};

const SESSION_KEY: i64 = 9001;

/// A moment after `race_start` + 2h, once the session is over
fn after_end() -> chrono::DateTime<chrono::Utc> {
    race_start() + chrono::Duration::hours(3)
}

struct Fixture {
    pool: sqlx::SqlitePool,
    locks: SessionLocks,
    rules: ScoringRules,
    session_id: i64,
    driver_ids: Vec<i64>,
    user_id: i64,
}

/// Race session with drivers 1..=6 finishing in number order, a user, and
/// the user's prediction picking the top five in the correct order
async fn race_fixture() -> Fixture {
    let pool = test_pool().await;
    let locks = SessionLocks::new();
    let session_id = seed_race_session(&pool).await;
    let driver_ids = seed_drivers(&pool, 6).await;
    let user_id = seed_user(&pool, "user7").await;

    predictions::create_race_prediction(
        &pool,
        predictions::RacePredictionDraft {
            user_id,
            session_id,
            p1: driver_ids[0],
            p2: driver_ids[1],
            p3: driver_ids[2],
            p4: driver_ids[3],
            p5: driver_ids[4],
            vsc: true,
            sc: false,
            dnf: 3,
        },
        before_start(),
    )
    .await
    .unwrap();

    let stub = StubTimingApi::new();
    stub.set_positions(
        SESSION_KEY,
        (1..=6).map(|n| (n, Some(n))).collect(),
    );
    for n in 1..=6 {
        stub.set_laps(SESSION_KEY, n, vec![74.0 + n as f64]);
    }
    ingest::ingest_session(&pool, &locks, &stub, session_id)
        .await
        .unwrap();

    Fixture {
        pool,
        locks,
        rules: ScoringRules::default(),
        session_id,
        driver_ids,
        user_id,
    }
}

/// Set the post-hoc race flags the way an admin correction would
async fn set_race_flags(fixture: &Fixture, vsc: bool, sf: bool, dnf: i64) {
    let session = sessions::lookup(&fixture.pool, fixture.session_id).await.unwrap();
    sessions::update_session(
        &fixture.pool,
        fixture.session_id,
        sessions::SessionDraft {
            weekend_id: session.weekend_id,
            circuit_key: session.circuit_key,
            circuit_short_name: session.circuit_short_name.clone(),
            country_code: session.country_code.clone(),
            country_name: session.country_name.clone(),
            location: session.location.clone(),
            session_key: session.session_key,
            session_name: session.session_name,
            session_type: session.session_type,
            date_start: session.date_start,
            date_end: session.date_end,
            year: session.year,
            vsc: Some(vsc),
            sf: Some(sf),
            dnf: Some(dnf),
        },
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn perfect_prediction_scores_full_points_and_updates_aggregate() {
    let fixture = race_fixture().await;
    set_race_flags(&fixture, true, false, 3).await;

    let report = scoring::run_scoring(
        &fixture.pool,
        &fixture.locks,
        &fixture.rules,
        fixture.session_id,
        after_end(),
    )
    .await
    .unwrap();
    assert_eq!(report.predictions_scored, 1);
    assert_eq!(report.users_updated, 1);

    let expected = fixture.rules.race_exact.iter().sum::<i64>()
        + fixture.rules.vsc_points
        + fixture.rules.sc_points
        + fixture.rules.dnf_exact_points;

    let (race_preds, _) = predictions::list_by_user(&fixture.pool, fixture.user_id)
        .await
        .unwrap();
    assert_eq!(race_preds[0].score, Some(expected));
    assert_eq!(user_score(&fixture.pool, fixture.user_id).await, expected);
}

#[tokio::test]
async fn rescoring_unchanged_session_is_a_no_op() {
    let fixture = race_fixture().await;
    set_race_flags(&fixture, true, false, 3).await;

    scoring::run_scoring(
        &fixture.pool,
        &fixture.locks,
        &fixture.rules,
        fixture.session_id,
        after_end(),
    )
        .await
        .unwrap();
    let score_after_first = user_score(&fixture.pool, fixture.user_id).await;

    let report = scoring::run_scoring(
        &fixture.pool,
        &fixture.locks,
        &fixture.rules,
        fixture.session_id,
        after_end(),
    )
    .await
    .unwrap();
    assert_eq!(report.users_updated, 0);
    assert_eq!(user_score(&fixture.pool, fixture.user_id).await, score_after_first);
}

#[tokio::test]
async fn correction_rescores_by_the_exact_difference() {
    let fixture = race_fixture().await;
    set_race_flags(&fixture, true, false, 3).await;
    scoring::run_scoring(
        &fixture.pool,
        &fixture.locks,
        &fixture.rules,
        fixture.session_id,
        after_end(),
    )
        .await
        .unwrap();
    let before = user_score(&fixture.pool, fixture.user_id).await;

    // Admin corrects the DNF count: the exact claim becomes off-by-one
    set_race_flags(&fixture, true, false, 4).await;
    scoring::run_scoring(
        &fixture.pool,
        &fixture.locks,
        &fixture.rules,
        fixture.session_id,
        after_end(),
    )
        .await
        .unwrap();

    let expected_drop = fixture.rules.dnf_exact_points - fixture.rules.dnf_close_points;
    assert_eq!(
        user_score(&fixture.pool, fixture.user_id).await,
        before - expected_drop
    );
}

#[tokio::test]
async fn deleting_a_scored_prediction_reverses_its_contribution() {
    let fixture = race_fixture().await;
    set_race_flags(&fixture, true, false, 3).await;
    scoring::run_scoring(
        &fixture.pool,
        &fixture.locks,
        &fixture.rules,
        fixture.session_id,
        after_end(),
    )
        .await
        .unwrap();
    assert!(user_score(&fixture.pool, fixture.user_id).await > 0);

    let (race_preds, _) = predictions::list_by_user(&fixture.pool, fixture.user_id)
        .await
        .unwrap();
    predictions::delete_prediction(
        &fixture.pool,
        &fixture.locks,
        race_preds[0].id,
        fixture.user_id,
    )
    .await
    .unwrap();

    assert_eq!(user_score(&fixture.pool, fixture.user_id).await, 0);

    // Re-running the engine finds no live predictions and changes nothing
    let report = scoring::run_scoring(
        &fixture.pool,
        &fixture.locks,
        &fixture.rules,
        fixture.session_id,
        after_end(),
    )
    .await
    .unwrap();
    assert_eq!(report.predictions_scored, 0);
    assert_eq!(user_score(&fixture.pool, fixture.user_id).await, 0);
}

#[tokio::test]
async fn predicted_driver_without_result_only_flags_count() {
    let fixture = race_fixture().await;
    // Second user predicts a driver who never got a result row at P1
    let other = seed_user(&fixture.pool, "user8").await;
    let ghost = {
        use prediapp_common::models::Driver;
        prediapp_api::db::drivers::save_driver(
            &fixture.pool,
            &Driver {
                id: 0,
                driver_number: 99,
                first_name: "Ghost".into(),
                last_name: "Driver".into(),
                full_name: "Ghost Driver".into(),
                name_acronym: "GHO".into(),
                country_code: "XXX".into(),
                team_name: "Test Racing".into(),
                headshot_url: None,
                active: true,
            },
        )
        .await
        .unwrap()
    };

    predictions::create_race_prediction(
        &fixture.pool,
        predictions::RacePredictionDraft {
            user_id: other,
            session_id: fixture.session_id,
            p1: ghost,
            p2: fixture.driver_ids[5],
            p3: fixture.driver_ids[4],
            p4: fixture.driver_ids[3],
            p5: fixture.driver_ids[2],
            vsc: true,
            sc: true,
            dnf: 0,
        },
        before_start(),
    )
    .await
    .unwrap();

    set_race_flags(&fixture, true, false, 3).await;
    scoring::run_scoring(
        &fixture.pool,
        &fixture.locks,
        &fixture.rules,
        fixture.session_id,
        after_end(),
    )
        .await
        .unwrap();

    // Ghost misses P1 entirely; the P2 pick finished sixth (outside the
    // top five); the P3 pick finished fifth (near), the P4 pick fourth
    // (exact), the P5 pick third (near); VSC right, SC wrong, DNF off by
    // three
    let rules = &fixture.rules;
    let expected =
        rules.race_near[2] + rules.race_exact[3] + rules.race_near[4] + rules.vsc_points;
    let score = user_score(&fixture.pool, other).await;
    assert_eq!(score, expected);
}

#[tokio::test]
async fn non_race_sessions_score_three_positions() {
    let pool = test_pool().await;
    let locks = SessionLocks::new();
    let rules = ScoringRules::default();
    let qualifying = sessions::create_session(
        &pool,
        session_draft(8, SessionName::Qualifying, SessionType::Qualifying, Some(9002)),
    )
    .await
    .unwrap();
    let driver_ids = seed_drivers(&pool, 4).await;
    let user_id = seed_user(&pool, "user7").await;

    predictions::create_session_prediction(
        &pool,
        predictions::SessionPredictionDraft {
            user_id,
            session_id: qualifying.id,
            p1: driver_ids[0],
            p2: driver_ids[2],
            p3: driver_ids[1],
        },
        before_start(),
    )
    .await
    .unwrap();

    let stub = StubTimingApi::new();
    stub.set_positions(9002, (1..=4).map(|n| (n, Some(n))).collect());
    for n in 1..=4 {
        stub.set_laps(9002, n, vec![70.0 + n as f64]);
    }
    ingest::ingest_session(&pool, &locks, &stub, qualifying.id)
        .await
        .unwrap();

    scoring::run_scoring(&pool, &locks, &rules, qualifying.id, after_end())
        .await
        .unwrap();

    // P1 exact, P2 and P3 swapped inside the top three
    let expected = rules.session_exact[0] + rules.session_near[1] + rules.session_near[2];
    assert_eq!(user_score(&pool, user_id).await, expected);
}

#[tokio::test]
async fn scoring_before_session_end_is_rejected() {
    let fixture = race_fixture().await;
    set_race_flags(&fixture, true, false, 3).await;

    let err = scoring::run_scoring(
        &fixture.pool,
        &fixture.locks,
        &fixture.rules,
        fixture.session_id,
        race_start() + chrono::Duration::hours(1),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    assert_eq!(user_score(&fixture.pool, fixture.user_id).await, 0);
}

#[tokio::test]
async fn concurrent_deletes_reverse_the_score_exactly_once() {
    let fixture = race_fixture().await;
    set_race_flags(&fixture, true, false, 3).await;
    scoring::run_scoring(
        &fixture.pool,
        &fixture.locks,
        &fixture.rules,
        fixture.session_id,
        after_end(),
    )
    .await
    .unwrap();
    assert!(user_score(&fixture.pool, fixture.user_id).await > 0);

    let (race_preds, _) = predictions::list_by_user(&fixture.pool, fixture.user_id)
        .await
        .unwrap();
    let prediction_id = race_preds[0].id;

    // Hold the session lock so both deletes read the live row and queue
    let guard = fixture.locks.acquire(fixture.session_id).await;
    let spawn_delete = || {
        let pool = fixture.pool.clone();
        let locks = fixture.locks.clone();
        let user_id = fixture.user_id;
        tokio::spawn(async move {
            predictions::delete_prediction(&pool, &locks, prediction_id, user_id).await
        })
    };
    let first = spawn_delete();
    let second = spawn_delete();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    drop(guard);

    let first = first.await.unwrap();
    let second = second.await.unwrap();

    // One delete wins, the loser observes the row already gone
    assert_eq!(first.is_ok() as u8 + second.is_ok() as u8, 1);
    let loser = if first.is_err() { first } else { second };
    assert!(matches!(loser.unwrap_err(), Error::NotFound(_)));

    assert_eq!(user_score(&fixture.pool, fixture.user_id).await, 0);
}
