//! Test fixtures: scripted upstream services and an in-process gateway,
//! each on an ephemeral localhost port.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use fanout_gateway::domain::ServiceConfig;
use fanout_gateway::{GatewayConfig, GatewayService};

pub const ENDPOINT: &str = "/api/test";

/// What an upstream saw
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: Method,
    pub host: Option<String>,
    pub body: Bytes,
}

/// Canned reply of a mock upstream
#[derive(Debug, Clone)]
pub struct Script {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: &'static str,
    /// Time to wait before answering
    pub delay: Duration,
}

impl Script {
    pub fn json(status: StatusCode, body: &'static str) -> Self {
        Self {
            status,
            content_type: "application/json",
            body,
            delay: Duration::ZERO,
        }
    }

    pub fn text(status: StatusCode, body: &'static str) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body,
            delay: Duration::ZERO,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Clone)]
struct MockState {
    script: Script,
    seen: Arc<Mutex<Vec<Seen>>>,
}

pub struct MockUpstream {
    pub addr: SocketAddr,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl MockUpstream {
    pub async fn spawn(script: Script) -> Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            script,
            seen: Arc::clone(&seen),
        };
        let app = Router::new()
            .route(ENDPOINT, any(scripted))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, seen }
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn service(&self, name: &str) -> ServiceConfig {
        ServiceConfig {
            name: name.to_string(),
            host: self.addr.ip().to_string(),
            port: self.addr.port(),
            endpoint: ENDPOINT.to_string(),
        }
    }
}

async fn scripted(
    State(state): State<MockState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], &'static str) {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.seen.lock().unwrap().push(Seen { method, host, body });

    let script = state.script;
    if !script.delay.is_zero() {
        tokio::time::sleep(script.delay).await;
    }
    (
        script.status,
        [(header::CONTENT_TYPE, script.content_type)],
        script.body,
    )
}

/// A port nothing listens on
pub async fn dead_service(name: &str) -> ServiceConfig {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    ServiceConfig {
        name: name.to_string(),
        host: "127.0.0.1".to_string(),
        port,
        endpoint: ENDPOINT.to_string(),
    }
}

/// Route table over `services`; upstream timeouts stay at their defaults
pub fn config(services: Vec<ServiceConfig>, routes: &[(&str, &[&str])]) -> GatewayConfig {
    let routes: BTreeMap<String, Vec<String>> = routes
        .iter()
        .map(|(route, members)| {
            (
                route.to_string(),
                members.iter().map(|m| m.to_string()).collect(),
            )
        })
        .collect();

    GatewayConfig {
        services,
        routes,
        ..GatewayConfig::default()
    }
}

/// Gateway served in-process; stops when dropped.
pub struct TestGateway {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<()>>,
}

impl TestGateway {
    pub async fn spawn(config: GatewayConfig) -> Self {
        let service = GatewayService::new(config).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let server = tokio::spawn(async move {
            service
                .serve(listener, async {
                    let _ = rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown: Some(tx),
            server: Some(server),
        }
    }

    /// Fire the shutdown signal without waiting for the server
    pub fn begin_shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }

    /// Wait until `serve` has returned
    pub async fn stopped(&mut self) {
        if let Some(server) = self.server.take() {
            server.await.unwrap();
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.begin_shutdown();
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
