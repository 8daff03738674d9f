//! Scoring rule table
//!
//! Fixed point values used by the scoring engine, loaded once at startup.
//! The engine depends only on the shape of this record; the values can be
//! overridden from a TOML file without touching the engine.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Error, Result};

/// Immutable point table for both prediction variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringRules {
    /// Points for the correct driver at the correct race position, P1..P5
    pub race_exact: [i64; 5],
    /// Points for a top-five driver predicted at the wrong race position
    pub race_near: [i64; 5],
    /// Correct virtual-safety-car claim
    pub vsc_points: i64,
    /// Correct safety-car claim
    pub sc_points: i64,
    /// DNF claim equal to the actual count
    pub dnf_exact_points: i64,
    /// DNF claim off by exactly one
    pub dnf_close_points: i64,
    /// Points for the correct driver at the correct position, P1..P3
    pub session_exact: [i64; 3],
    /// Points for a top-three driver predicted at the wrong position
    pub session_near: [i64; 3],
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            race_exact: [10, 8, 6, 4, 2],
            race_near: [5, 4, 3, 2, 1],
            vsc_points: 5,
            sc_points: 5,
            dnf_exact_points: 10,
            dnf_close_points: 5,
            session_exact: [8, 6, 4],
            session_near: [4, 3, 2],
        }
    }
}

impl ScoringRules {
    /// Load rules from a TOML file; missing keys fall back to the defaults
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let rules: ScoringRules = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("invalid scoring rules file: {e}")))?;
        rules.validate()?;
        Ok(rules)
    }

    /// Near points must never exceed exact points, per rule shape
    pub fn validate(&self) -> Result<()> {
        for k in 0..5 {
            if self.race_near[k] >= self.race_exact[k] {
                return Err(Error::Config(format!(
                    "race_near[{k}] must be less than race_exact[{k}]"
                )));
            }
        }
        for k in 0..3 {
            if self.session_near[k] >= self.session_exact[k] {
                return Err(Error::Config(format!(
                    "session_near[{k}] must be less than session_exact[{k}]"
                )));
            }
        }
        Ok(())
    }
}
