//! Request counters exposed on `/metrics`.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Gateway metrics
#[derive(Default)]
pub struct GatewayMetrics {
    // Inbound
    pub requests_total: AtomicU64,
    pub requests_unrouted: AtomicU64,
    pub fan_out_requests: AtomicU64,

    // Outbound
    pub upstream_calls: AtomicU64,
    pub upstream_failures: AtomicU64,
    pub upstream_bytes: AtomicU64,

    // Latency tracking (sum/count, no histogram)
    pub total_latency_ms: AtomicU64,
    pub request_count_for_latency: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub requests_unrouted: u64,
    pub fan_out_requests: u64,
    pub upstream_calls: u64,
    pub upstream_failures: u64,
    pub upstream_bytes: u64,
    pub average_latency_ms: f64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an inbound request once it has been answered
    pub fn record_request(&self, routed: bool, latency_ms: u64) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if !routed {
            self.requests_unrouted.fetch_add(1, Ordering::Relaxed);
        }
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.request_count_for_latency
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request forwarded to more than one upstream
    pub fn record_fan_out(&self) {
        self.fan_out_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one upstream call
    pub fn record_upstream(&self, success: bool, bytes: u64) {
        self.upstream_calls.fetch_add(1, Ordering::Relaxed);
        if success {
            self.upstream_bytes.fetch_add(bytes, Ordering::Relaxed);
        } else {
            self.upstream_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get average latency in ms
    pub fn average_latency_ms(&self) -> f64 {
        let total = self.total_latency_ms.load(Ordering::Relaxed);
        let count = self.request_count_for_latency.load(Ordering::Relaxed);
        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_unrouted: self.requests_unrouted.load(Ordering::Relaxed),
            fan_out_requests: self.fan_out_requests.load(Ordering::Relaxed),
            upstream_calls: self.upstream_calls.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            upstream_bytes: self.upstream_bytes.load(Ordering::Relaxed),
            average_latency_ms: self.average_latency_ms(),
        }
    }

    /// Export metrics as JSON
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or_default()
    }
}

/// Request timer for latency tracking
pub struct RequestTimer {
    start: Instant,
}

impl RequestTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
