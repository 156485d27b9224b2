//! Huddle Relay Server -- room rendezvous and signaling fan-out.
//!
//! An axum WebSocket server that lets clients join named rooms, exchange
//! chat messages, and bootstrap peer-to-peer calls by relaying WebRTC
//! signaling metadata. The relay never touches media -- it only routes
//! signaling envelopes between room members.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:5000
//! cargo run --bin huddle-relay
//!
//! # Run on custom address with a custom dashboard origin
//! cargo run --bin huddle-relay -- --bind 127.0.0.1:8080 \
//!     --allowed-origin https://dashboard.example.org
//!
//! # Or via environment variable
//! HUDDLE_ADDR=127.0.0.1:8080 cargo run --bin huddle-relay
//! ```

use std::sync::Arc;

use clap::Parser;
use huddle_relay::config::{RelayCliArgs, RelayConfig};
use huddle_relay::relay::{self, RelayState};

#[tokio::main]
async fn main() {
    let cli = RelayCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match RelayConfig::load(&cli) {
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

    tracing::info!(addr = %config.bind_addr, "starting huddle relay server");

    let state = Arc::new(RelayState::from_config(&config));

    match relay::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(
                addr = %bound_addr,
                origin = %config.allowed_origin,
                "relay server listening"
            );
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "relay server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start relay server");
            std::process::exit(1);
        }
    }
}
