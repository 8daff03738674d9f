//! Service configuration
//!
//! Resolution order for every setting: command-line argument, then
//! environment variable, then compiled default.

use std::path::PathBuf;

/// Default openf1.org API base URL
pub const DEFAULT_OPENF1_URL: &str = "https://api.openf1.org/v1";

/// Runtime configuration for a PrediApp service
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port the HTTP server binds to
    pub port: u16,
    /// Path to the SQLite database file
    pub db_path: PathBuf,
    /// Base URL of the external timing API
    pub openf1_url: String,
    /// Optional TOML file overriding the default scoring rule table
    pub rules_path: Option<PathBuf>,
}

impl Config {
    /// Assemble configuration from optional CLI overrides and environment
    pub fn resolve(
        cli_port: Option<u16>,
        cli_db: Option<PathBuf>,
        cli_rules: Option<PathBuf>,
    ) -> Self {
        let port = cli_port
            .or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse().ok()))
            .unwrap_or(8080);

        let db_path = cli_db
            .or_else(|| std::env::var("PREDIAPP_DB").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("prediapp.db"));

        let openf1_url = std::env::var("OPENF1_URL")
            .unwrap_or_else(|_| DEFAULT_OPENF1_URL.to_string());

        let rules_path = cli_rules.or_else(|| std::env::var("SCORING_RULES").ok().map(PathBuf::from));

        Self {
            port,
            db_path,
            openf1_url,
            rules_path,
        }
    }
}
