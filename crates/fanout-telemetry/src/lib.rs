//! # Fanout Telemetry
//!
//! Logging setup shared by the gateway and the image tooling.
//!
//! All output goes to standard output, one JSON object per line, and every
//! line is flushed as soon as it is written. Inside a container this means
//! log lines are visible to `docker logs` immediately, without relying on
//! any runtime buffering flag.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fanout_telemetry::{init_logging, TelemetryConfig};
//!
//! let _logger = init_logging(&TelemetryConfig::from_env())?;
//! tracing::info!(upstream = "service1", "request");
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `FANOUT_SERVICE_NAME` | `fanout-gateway` | Service name in the startup line |
//! | `FANOUT_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `FANOUT_JSON_LOGS` | `true` | JSON lines instead of plain text |
//! | `FANOUT_LOG_SOURCE` | `false` | Include file and line numbers |

#![warn(clippy::all)]
#![deny(unsafe_code)]

mod config;
mod logging;
mod writer;

pub use config::TelemetryConfig;
pub use logging::{build_filter, init_logging, StructuredLogger};
pub use writer::{FlushingWriter, UnbufferedStdout};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    Filter(String),

    #[error("failed to install log subscriber: {0}")]
    Init(String),
}
