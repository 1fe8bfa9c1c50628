//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for process logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name reported on the startup line
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error or a full directive)
    pub log_level: String,

    /// Emit one JSON object per line instead of human-readable text
    pub json_logs: bool,

    /// Include source file and line in JSON output
    pub with_source_location: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "fanout-gateway".to_string(),
            log_level: "info".to_string(),
            json_logs: true,
            with_source_location: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `FANOUT_SERVICE_NAME`: Service name (default: fanout-gateway)
    /// - `FANOUT_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `FANOUT_JSON_LOGS`: JSON output (default: true)
    /// - `FANOUT_LOG_SOURCE`: Include file/line (default: false)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            service_name: lookup("FANOUT_SERVICE_NAME").unwrap_or(defaults.service_name),

            log_level: lookup("FANOUT_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            json_logs: lookup("FANOUT_JSON_LOGS")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.json_logs),

            with_source_location: lookup("FANOUT_LOG_SOURCE")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.with_source_location),
        }
    }

    /// Configuration for a named tool sharing the workspace defaults.
    pub fn for_service(service_name: &str) -> Self {
        let mut config = Self::from_env();
        config.service_name = service_name.to_string();
        config
    }
}
