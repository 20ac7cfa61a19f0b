//! # Switchyard node
//!
//! Runs the topic bus on the vehicle, bridges it to the remote control
//! service and drives the configured vehicle.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! switchyard
//!
//! # Run with a specific config file
//! SWITCHYARD_CONFIG=/path/to/switchyard.toml switchyard
//!
//! # Run with environment variables
//! SWITCHYARD_GATEWAY_URL=wss://control.example.com/ws SWITCHYARD_AUTH_TOKEN=... switchyard
//! ```

mod boot;
mod config;
mod http;
mod input;
mod limiter;
mod metrics;
mod topics;
mod vehicle;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "switchyard=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!(
        driver = %config.vehicle.driver,
        gateway = %config.gateway.url,
        "Starting Switchyard node"
    );

    let node = boot::Node::build(config)?;
    node.run().await
}
