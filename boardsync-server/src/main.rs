//! `BoardSync` Server -- the authoritative board backend.
//!
//! An axum WebSocket server that holds the task store, serializes
//! order recomputation, and broadcasts change events to every
//! connected client.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:9100 with the demo identities
//! cargo run --bin boardsync-server -- --demo
//!
//! # Run on custom address
//! cargo run --bin boardsync-server -- --bind 127.0.0.1:8080
//!
//! # Or via environment variable
//! BOARDSYNC_ADDR=127.0.0.1:8080 cargo run --bin boardsync-server
//! ```

use std::sync::Arc;

use clap::Parser;

use boardsync_server::auth::StaticTokenAuth;
use boardsync_server::config::{ServerCliArgs, ServerConfig};
use boardsync_server::server::{self, ServerState};

#[tokio::main]
async fn main() {
    let cli = ServerCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match ServerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing with the resolved log level.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let mut auth = StaticTokenAuth::new(config.tokens.clone());
    if config.demo {
        tracing::info!("seeding demo identities: alice, bob, admin");
        auth.add_demo_users();
    }
    if auth.is_empty() {
        tracing::warn!("no identity tokens configured; every hello will be rejected");
    }

    tracing::info!(addr = %config.bind_addr, "starting boardsync server");

    let state = Arc::new(ServerState::new(auth));
    match server::start_server(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "board server listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "board server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start board server");
            std::process::exit(1);
        }
    }
}
