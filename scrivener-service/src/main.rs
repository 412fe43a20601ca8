use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

mod api;
mod config;
mod db;
mod error;
mod ingestion;
mod llama;
mod service;
mod tasks;
mod vector_store;

use crate::config::StaticConfig;
use crate::db::Database;
use crate::service::ScrivenerService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_logging();

    info!(
        "Starting Scrivener service v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration from config file and SCRIVENER__* env vars
    let config = Arc::new(StaticConfig::load()?);
    info!(
        host = %config.server.host,
        port = config.server.port,
        "Configuration loaded"
    );

    // Ensure working directories exist
    std::fs::create_dir_all(&config.storage.data_dir)?;
    std::fs::create_dir_all(&config.storage.scratch_dir)?;

    // Initialize the job database
    let db_path = config.storage.data_dir.join("jobs.db");
    let db = Arc::new(Database::open(&db_path)?);
    info!(path = %db_path.display(), "Database initialized");

    // Initialize the service; this probes llama-server and the vector
    // store and starts the persistence worker
    let service = ScrivenerService::initialize(config.clone(), db).await?;

    // Build the router
    let app = api::router(service, &config);

    // Start the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("scrivener_service=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format))
        .with(filter)
        .init();
}
