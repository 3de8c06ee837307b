//! Pairing gateway - entry point.

use mega_client::MegaClient;
use pair_gateway::api::{create_router, AppState};
use pair_gateway::config::Config;
use pair_gateway::supervisor::Supervisor;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting pairing gateway");

    // Install the last-resort fault handler before any session can spawn
    let supervisor = Supervisor::new(config.supervisor.clone());
    supervisor.install_fault_handler();

    // Remote storage client, shared by all sessions
    let uploader = match MegaClient::new(
        config.storage.api_url.clone(),
        config.storage.email.clone(),
        config.storage.password.clone(),
    ) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create storage client: {}", e);
            std::process::exit(1);
        }
    };

    // Bind to address
    let addr = SocketAddr::new(
        config.server.listen_addr.parse().unwrap_or([0, 0, 0, 0].into()),
        config.server.port,
    );

    let state = AppState::new(config, uploader, supervisor);
    let app = create_router(state);

    info!("Listening on {}", addr);

    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
