//! Domain types for the gateway.
//!
//! Configuration, the routing table, upstream replies and error handling.
//! Nothing in here performs I/O apart from reading a config file.

pub mod config;
pub mod correlation;
pub mod error;
pub mod routing;
pub mod upstream;

// Re-exports for convenience
pub use config::{ConfigError, GatewayConfig, LimitsConfig, ServiceConfig, UpstreamOptions};
pub use correlation::TransactionId;
pub use error::{ForwardError, GatewayError, GatewayResult};
pub use routing::RoutingTable;
pub use upstream::{bad_gateway_text, Upstream, UpstreamReply};
