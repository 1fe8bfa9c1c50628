//! Fanout Gateway - HTTP API gateway with declarative fan-out routing.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                      FANOUT GATEWAY :8080                     │
//! ├───────────────────────────────────────────────────────────────┤
//! │   ANY /api/{service}        GET /health      GET /metrics     │
//! │            │                                                  │
//! │  ┌─────────┴──────────────────────────┐                       │
//! │  │  Tracing (tx id) → BodyLimit       │                       │
//! │  └─────────┬──────────────────────────┘                       │
//! │            │                                                  │
//! │  ┌─────────┴──────────┐   ┌──────────────────────────┐        │
//! │  │   Routing Table    │──▶│ Forwarder (join_all)     │        │
//! │  └────────────────────┘   └────────────┬─────────────┘        │
//! │                                        │                      │
//! │                           ┌────────────┴─────────────┐        │
//! │                           │ Reconcile (relay / merge)│        │
//! │                           └──────────────────────────┘        │
//! └────────────────────────────────────────┼──────────────────────┘
//!                                          │
//!              ┌───────────────────────────┼──────────────────┐
//!              ▼                           ▼                  ▼
//!         service1:9091              service2:9092      service3:9093
//! ```
//!
//! A route with one upstream relays that upstream's reply untouched. A route
//! with several upstreams answers with the lowest status code among them and
//! a JSON object keyed by upstream name.
//!
//! # Usage
//!
//! ```ignore
//! use fanout_gateway::{GatewayConfig, GatewayService};
//!
//! let service = GatewayService::new(GatewayConfig::load()?)?;
//! service.run().await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod domain;
pub mod middleware;
pub mod proxy;
pub mod service;

// Re-exports for public API
pub use domain::config::GatewayConfig;
pub use domain::error::{ForwardError, GatewayError, GatewayResult};
pub use domain::{RoutingTable, TransactionId, Upstream, UpstreamReply};
pub use middleware::GatewayMetrics;
pub use service::{shutdown_signal, GatewayService};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
