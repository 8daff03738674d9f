//! Database initialization and schema
//!
//! All PrediApp services share one SQLite database; the schema is created
//! idempotently at startup.

pub mod init;

pub use init::{init_database, init_schema};
