//! Upstream services and the replies they produce.

use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use serde_json::Value;

use super::config::ServiceConfig;
use super::correlation::TransactionId;

/// A resolved upstream endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub endpoint: String,
    scheme: String,
}

impl Upstream {
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        endpoint: impl Into<String>,
        scheme: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            endpoint: endpoint.into(),
            scheme: scheme.into(),
        }
    }

    pub fn from_config(service: &ServiceConfig, scheme: &str) -> Self {
        Self::new(
            service.name.clone(),
            service.host.clone(),
            service.port,
            service.endpoint.clone(),
            scheme,
        )
    }

    /// Full request URL, e.g. `http://0.0.0.0:9091/api/test`
    pub fn url(&self) -> String {
        format!("{}://{}:{}{}", self.scheme, self.host, self.port, self.endpoint)
    }

    /// Value sent as the `Host` header
    pub fn host_port(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Reply collected from one upstream, real or synthesized on failure
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub name: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamReply {
    /// Synthetic reply standing in for an upstream that could not be reached
    pub fn bad_gateway(name: impl Into<String>, tx: TransactionId) -> Self {
        Self {
            name: name.into(),
            status: StatusCode::BAD_GATEWAY,
            headers: HeaderMap::new(),
            body: Bytes::from(bad_gateway_text(tx)),
        }
    }

    /// Body as JSON, or `{"error": <body text>}` if it is not valid JSON
    pub fn transform(&self) -> Value {
        match serde_json::from_slice(&self.body) {
            Ok(value) => value,
            Err(_) => serde_json::json!({
                "error": String::from_utf8_lossy(&self.body)
            }),
        }
    }
}

/// Body text of every gateway-generated 502
pub fn bad_gateway_text(tx: TransactionId) -> String {
    format!("Bad gateway #trace={}", tx)
}
