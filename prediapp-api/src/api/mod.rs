//! HTTP handlers for prediapp-api

pub mod health;
pub mod prodes;
pub mod results;
pub mod sessions;
