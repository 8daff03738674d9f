//! Domain models shared across PrediApp services
//!
//! Sessions, drivers, users, predictions, and results as stored in the
//! relational store. Session name/type are closed enums so the valid pair
//! check is a total match instead of string comparison.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Scheduled appearance of the championship at a circuit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub weekend_id: i64,
    pub circuit_key: i64,
    pub circuit_short_name: String,
    pub country_code: String,
    pub country_name: String,
    pub location: String,
    /// External identifier from the timing API; unique when set
    pub session_key: Option<i64>,
    pub session_name: SessionName,
    pub session_type: SessionType,
    pub date_start: DateTime<Utc>,
    pub date_end: DateTime<Utc>,
    pub year: i32,
    /// Virtual safety car occurred (Race sessions only, set post-hoc)
    pub vsc: Option<bool>,
    /// Safety car occurred (Race sessions only, set post-hoc)
    pub sf: Option<bool>,
    /// Count of non-finishers (Race sessions only, set post-hoc)
    pub dnf: Option<i64>,
}

impl Session {
    /// True iff predictions on this session may still be written at `now`.
    /// The inequality is strict: a write at exactly `date_start` is late.
    pub fn prediction_window_open(&self, now: DateTime<Utc>) -> bool {
        now < self.date_start
    }

    pub fn is_race(&self) -> bool {
        self.session_name == SessionName::Race
    }
}

/// The seven session names of a race weekend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionName {
    #[serde(rename = "Practice 1")]
    Practice1,
    #[serde(rename = "Practice 2")]
    Practice2,
    #[serde(rename = "Practice 3")]
    Practice3,
    Qualifying,
    #[serde(rename = "Sprint Qualifying")]
    SprintQualifying,
    Sprint,
    Race,
}

impl SessionName {
    /// The unique session type each name is valid under
    pub fn expected_type(self) -> SessionType {
        match self {
            SessionName::Practice1 | SessionName::Practice2 | SessionName::Practice3 => {
                SessionType::Practice
            }
            SessionName::Qualifying | SessionName::SprintQualifying => SessionType::Qualifying,
            SessionName::Sprint | SessionName::Race => SessionType::Race,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionName::Practice1 => "Practice 1",
            SessionName::Practice2 => "Practice 2",
            SessionName::Practice3 => "Practice 3",
            SessionName::Qualifying => "Qualifying",
            SessionName::SprintQualifying => "Sprint Qualifying",
            SessionName::Sprint => "Sprint",
            SessionName::Race => "Race",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "Practice 1" => Ok(SessionName::Practice1),
            "Practice 2" => Ok(SessionName::Practice2),
            "Practice 3" => Ok(SessionName::Practice3),
            "Qualifying" => Ok(SessionName::Qualifying),
            "Sprint Qualifying" => Ok(SessionName::SprintQualifying),
            "Sprint" => Ok(SessionName::Sprint),
            "Race" => Ok(SessionName::Race),
            other => Err(Error::BadRequest(format!("unknown session name: {other}"))),
        }
    }
}

/// Coarse classification of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionType {
    Practice,
    Qualifying,
    Race,
}

impl SessionType {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionType::Practice => "Practice",
            SessionType::Qualifying => "Qualifying",
            SessionType::Race => "Race",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "Practice" => Ok(SessionType::Practice),
            "Qualifying" => Ok(SessionType::Qualifying),
            "Race" => Ok(SessionType::Race),
            other => Err(Error::BadRequest(format!("unknown session type: {other}"))),
        }
    }
}

/// Validate a `(session_name, session_type)` pair against the seven
/// enumerated valid combinations
pub fn validate_name_type_pair(name: SessionName, session_type: SessionType) -> Result<()> {
    if name.expected_type() == session_type {
        Ok(())
    } else {
        Err(Error::BadRequest(format!(
            "invalid session pair: name '{}' requires type '{}', got '{}'",
            name.as_str(),
            name.expected_type().as_str(),
            session_type.as_str()
        )))
    }
}

/// Canonical driver identity referenced by predictions and results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: i64,
    pub driver_number: i64,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub name_acronym: String,
    pub country_code: String,
    pub team_name: String,
    pub headshot_url: Option<String>,
    pub active: bool,
}

/// Principal who submits predictions (account management lives elsewhere)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Sum of all this user's prediction scores
    pub score: i64,
    pub active: bool,
}

/// Prediction for a Race session: five ordered positions plus the
/// race-only claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RacePrediction {
    pub id: i64,
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
    /// Null until the scoring engine has processed the session
    pub score: Option<i64>,
}

impl RacePrediction {
    pub fn picks(&self) -> [i64; 5] {
        [self.p1, self.p2, self.p3, self.p4, self.p5]
    }
}

/// Prediction for any non-Race session: three ordered positions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPrediction {
    pub id: i64,
    pub user_id: i64,
    pub session_id: i64,
    pub p1: i64,
    pub p2: i64,
    pub p3: i64,
    pub score: Option<i64>,
}

impl SessionPrediction {
    pub fn picks(&self) -> [i64; 3] {
        [self.p1, self.p2, self.p3]
    }
}

/// Tagged sum over the two prediction variants
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum Prediction {
    Race(RacePrediction),
    Session(SessionPrediction),
}

impl Prediction {
    pub fn id(&self) -> i64 {
        match self {
            Prediction::Race(p) => p.id,
            Prediction::Session(p) => p.id,
        }
    }

    pub fn user_id(&self) -> i64 {
        match self {
            Prediction::Race(p) => p.user_id,
            Prediction::Session(p) => p.user_id,
        }
    }

    pub fn session_id(&self) -> i64 {
        match self {
            Prediction::Race(p) => p.session_id,
            Prediction::Session(p) => p.session_id,
        }
    }

    pub fn score(&self) -> Option<i64> {
        match self {
            Prediction::Race(p) => p.score,
            Prediction::Session(p) => p.score,
        }
    }
}

/// One finishing-position row per `(session, driver)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    pub id: i64,
    pub session_id: i64,
    pub driver_id: i64,
    /// 1-based finishing position; null represents a non-finisher
    pub position: Option<i64>,
    /// Fastest valid lap in seconds, 0.0 when the driver set no valid lap
    pub fastest_lap_time: f64,
}
