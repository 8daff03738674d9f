//! PrediApp common library
//!
//! Shared error types, configuration, database schema, domain models, and
//! the scoring rule table used by the PrediApp services.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod rules;

pub use error::{Error, Result};
pub use rules::ScoringRules;
