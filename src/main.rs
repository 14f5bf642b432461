//! WebRTC Signaling Relay - Entry Point
//!
//! Loads configuration, binds the TCP listener and hands it to the relay.

use std::env;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use signal_relay::{serve, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=signal_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("signal_relay=info")),
        )
        .init();

    let mut config = Config::from_env()?;

    // Bind address from command line wins over the environment
    if let Some(addr) = env::args().nth(1) {
        config.addr = addr;
    }

    let listener = TcpListener::bind(&config.addr).await?;
    info!("Signaling relay listening on {}", config.addr);

    serve(listener, config).await;

    Ok(())
}
