//! # Fanout Gateway
//!
//! Container entry process. Takes no arguments; configuration comes from
//! the built-in defaults, optionally replaced by the TOML file named in
//! `FANOUT_CONFIG`.
//!
//! ## Startup Sequence
//!
//! 1. Install unbuffered JSON logging on stdout
//! 2. Load and validate configuration
//! 3. Build the routing table and upstream client
//! 4. Serve until SIGINT/SIGTERM, then drain in-flight requests
//!
//! Any startup failure exits non-zero, which becomes the container's exit
//! status.

use anyhow::{Context, Result};
use tracing::info;

use fanout_gateway::{GatewayConfig, GatewayService, VERSION};
use fanout_telemetry::{init_logging, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let _logger =
        init_logging(&TelemetryConfig::from_env()).context("failed to initialize logging")?;

    let config = GatewayConfig::load().context("failed to load gateway configuration")?;

    info!(
        version = VERSION,
        addr = %config.http_addr(),
        services = config.services.len(),
        "starting fanout gateway"
    );

    let service = GatewayService::new(config).context("failed to build gateway")?;
    service.run().await.context("gateway terminated with an error")?;

    Ok(())
}
