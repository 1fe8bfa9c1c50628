//! Middleware stack for the gateway.
//!
//! Layer order: Request → Tracing (transaction id + span) → BodyLimit → Handler

pub mod metrics;
pub mod tracing;

pub use metrics::{GatewayMetrics, MetricsSnapshot, RequestTimer};
pub use tracing::TracingLayer;
