//! # occutrackd: occupancy tracking daemon
//!
//! Composition root that wires the snapshot store into the tracker service
//! and serves JSON-lines commands on stdin/stdout.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Install the `tracing` subscriber (logs go to stderr)
//! - Initialize the `SQLite` connection pool and run migrations
//! - Load the persisted snapshot log and rebuild the tracker state
//! - Serve commands until end of input or SIGINT
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

use anyhow::Context;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use occutrack_adapter_storage_sqlite_sqlx::{Config as DatabaseConfig, SqliteSnapshotStore};
use occutrack_app::services::tracker_service::TrackerService;
use occutrackd::command;
use occutrackd::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .with_writer(std::io::stderr)
        .init();

    let layout = config.to_layout().context("failed to build house layout")?;

    // Database
    let db = DatabaseConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await
    .context("failed to open snapshot database")?;
    let store = SqliteSnapshotStore::new(db.pool().clone());

    // Tracker
    let service = TrackerService::load(layout, config.engine.clone(), store)
        .await
        .context("failed to restore tracker from snapshot log")?;
    tracing::info!("occutrackd ready, reading commands from stdin");

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    tokio::select! {
        result = command::serve(&service, stdin, stdout) => {
            result.context("command loop failed")?;
            tracing::info!("end of input, shutting down");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, shutting down");
        }
    }

    Ok(())
}
