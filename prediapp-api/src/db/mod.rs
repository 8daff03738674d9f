//! Database operations for prediapp-api
//!
//! Plain async functions over the shared pool, one module per entity.

pub mod drivers;
pub mod predictions;
pub mod results;
pub mod sessions;
pub mod users;

use prediapp_common::Error;

/// Translate a unique-constraint violation into a domain `Conflict`,
/// passing every other database error through
pub(crate) fn map_unique_violation(err: sqlx::Error, conflict_message: &str) -> Error {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            Error::Conflict(conflict_message.to_string())
        }
        _ => Error::Database(err),
    }
}
