//! prediapp-api - prediction lifecycle and scoring service
//!
//! Owns sessions, predictions, results, and scoring over a shared store;
//! talks to the openf1.org timing API for result ingestion.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use prediapp_api::{build_router, openf1::OpenF1Client, AppState};
use prediapp_common::{config::Config, db::init_database, ScoringRules};

#[derive(Parser, Debug)]
#[command(name = "prediapp-api", about = "PrediApp prediction and scoring service")]
struct Args {
    /// TCP port to listen on (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Path to the SQLite database file (overrides PREDIAPP_DB)
    #[arg(long)]
    db: Option<PathBuf>,

    /// TOML file overriding the default scoring rules (overrides SCORING_RULES)
    #[arg(long)]
    rules: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting prediapp-api v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = Config::resolve(args.port, args.db, args.rules);

    let rules = match &config.rules_path {
        Some(path) => {
            let rules = ScoringRules::load(path)?;
            info!("Loaded scoring rules from {}", path.display());
            rules
        }
        None => ScoringRules::default(),
    };

    let pool = init_database(&config.db_path).await?;
    info!("✓ Connected to database");

    let timing = Arc::new(OpenF1Client::new(config.openf1_url.clone()));
    let state = AppState::new(pool, rules, timing);
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("prediapp-api listening on http://{addr}");
    info!("Health check: http://{addr}/health");

    axum::serve(listener, app).await?;

    Ok(())
}
