//! Gateway error types.

use super::config::ConfigError;

/// Gateway-level errors (startup and serving)
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Server socket bind error
    #[error("server bind error on {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Outbound HTTP client could not be built
    #[error("http client error: {0}")]
    Client(String),

    /// Server stopped with an I/O error
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Why a single upstream call produced no real reply
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("connection error: {0}")]
    Connect(#[source] reqwest::Error),

    #[error("upstream timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("failed to read reply body: {0}")]
    Body(#[source] reqwest::Error),
}

impl ForwardError {
    /// Classify an error raised while sending the request
    pub fn from_send(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ForwardError::Timeout(e)
        } else if e.is_connect() {
            ForwardError::Connect(e)
        } else {
            ForwardError::Request(e)
        }
    }

    /// Short label used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            ForwardError::Connect(_) => "connect",
            ForwardError::Timeout(_) => "timeout",
            ForwardError::Request(_) => "request",
            ForwardError::Body(_) => "body",
        }
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
