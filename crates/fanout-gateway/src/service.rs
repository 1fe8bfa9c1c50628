//! Gateway service - HTTP surface and server lifecycle.
//!
//! Routes:
//! - `ANY /api/{service}`: fan out to the route's upstreams
//! - `GET /health`: liveness document
//! - `GET /metrics`: JSON counters

use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Extension, Json, Router,
};
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

use crate::domain::{
    bad_gateway_text, GatewayConfig, GatewayError, GatewayResult, RoutingTable, TransactionId,
};
use crate::middleware::{GatewayMetrics, RequestTimer, TracingLayer};
use crate::proxy::{reconcile, Forwarder};

/// Gateway service state
pub struct GatewayService {
    config: GatewayConfig,
    routing: Arc<RoutingTable>,
    forwarder: Forwarder,
    metrics: Arc<GatewayMetrics>,
}

impl GatewayService {
    /// Create a new gateway from a configuration. Fails on invalid config.
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let routing = Arc::new(RoutingTable::from_config(&config)?);
        let metrics = Arc::new(GatewayMetrics::new());
        let forwarder = Forwarder::new(&config.upstream, Arc::clone(&metrics))?;

        Ok(Self {
            config,
            routing,
            forwarder,
            metrics,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Get metrics
    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Build the HTTP router
    pub fn router(&self) -> Router {
        let state = AppState {
            routing: Arc::clone(&self.routing),
            forwarder: self.forwarder.clone(),
            metrics: Arc::clone(&self.metrics),
        };

        Router::new()
            .route("/api/:service", any(gateway))
            .route("/health", get(health_check))
            .route("/metrics", get(metrics_report))
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(self.config.limits.max_request_size))
            .layer(TracingLayer::new())
            .with_state(state)
    }

    /// Bind the configured address and serve until SIGINT or SIGTERM.
    pub async fn run(self) -> GatewayResult<()> {
        let addr = self.config.http_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| GatewayError::Bind { addr, source })?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves.
    /// In-flight requests are drained before returning.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> GatewayResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        info!(
            addr = %addr,
            routes = self.routing.len(),
            "gateway listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("gateway stopped");
        Ok(())
    }
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    routing: Arc<RoutingTable>,
    forwarder: Forwarder,
    metrics: Arc<GatewayMetrics>,
}

/// Main gateway handler
async fn gateway(
    State(state): State<AppState>,
    Path(service): Path<String>,
    tx: Option<Extension<TransactionId>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let timer = RequestTimer::start();
    let tx = tx.map(|Extension(tx)| tx).unwrap_or_default();
    let route = service.trim();

    info!(upstream = %route, tx = %tx, "request");

    let Some(upstreams) = state.routing.resolve(route) else {
        error!(upstream = %route, tx = %tx, "no routes to upstream");
        state.metrics.record_request(false, timer.elapsed_ms());
        return (StatusCode::BAD_GATEWAY, bad_gateway_text(tx)).into_response();
    };

    let body = (!body.is_empty()).then_some(body);
    let replies = state
        .forwarder
        .fan_out(upstreams, &method, &headers, body, tx)
        .await;

    let response = reconcile(replies);
    state.metrics.record_request(true, timer.elapsed_ms());
    response
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "fanout-gateway",
        "version": crate::VERSION
    }))
}

async fn metrics_report(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.to_json())
}

/// Resolves on SIGINT, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("received shutdown signal");
}
