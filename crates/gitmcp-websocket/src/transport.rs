//! WebSocket transport binding.
//!
//! Upgrades on `/` and `/ws`; `GET /health` reports liveness. Connection
//! futures are tracked with a [`TaskTracker`] so `stop()` can wait for them
//! after the HTTP server itself has shut down.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use gitmcp_http::server::{ServerHandle, bind_listener, health_response};
use gitmcp_transport_traits::{
    CONNECTION_LOG_TARGET, ConnectionInfo, HealthReport, Lifecycle, LifecycleState,
    MAX_MESSAGE_SIZE, SharedHandler, TransportBinding, TransportConfig, TransportError,
    TransportFactory, TransportKind, TransportResult, WebSocketConfig,
};
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::connection::Connection;

/// Health route served next to the upgrade routes.
pub const HEALTH_PATH: &str = "/health";

#[derive(Debug)]
struct WsShared {
    config: WebSocketConfig,
    lifecycle: Lifecycle,
    bound: RwLock<Option<SocketAddr>>,
    connections: TaskTracker,
    next_id: AtomicU64,
    shutdown: CancellationToken,
    force: CancellationToken,
}

impl WsShared {
    fn connection_info(&self) -> ConnectionInfo {
        let port = self.bound.read().map_or(self.config.port, |addr| addr.port());
        let host = &self.config.host;
        let interval = self.config.heartbeat_interval;
        ConnectionInfo::new(TransportKind::WebSocket)
            .with("state", self.lifecycle.state())
            .with("host", host.as_str())
            .with("port", port)
            .with("url", format!("ws://{host}:{port}/ws"))
            .with("health_url", format!("http://{host}:{port}{HEALTH_PATH}"))
            .with("heartbeat_interval_secs", interval.as_secs())
            .with(
                "heartbeat_interval_ms",
                u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            )
            .with("active_connections", self.connections.len())
    }
}

#[derive(Clone)]
struct WsAppState {
    shared: Arc<WsShared>,
    handler: SharedHandler,
}

/// WebSocket transport binding.
#[derive(Debug)]
pub struct WebSocketTransport {
    shared: Arc<WsShared>,
    server: Mutex<Option<ServerHandle>>,
}

impl WebSocketTransport {
    /// Create a binding for `config`. Nothing is bound until `start()`.
    #[must_use]
    pub fn new(config: WebSocketConfig) -> Self {
        Self {
            shared: Arc::new(WsShared {
                config,
                lifecycle: Lifecycle::new(TransportKind::WebSocket),
                bound: RwLock::new(None),
                connections: TaskTracker::new(),
                next_id: AtomicU64::new(1),
                shutdown: CancellationToken::new(),
                force: CancellationToken::new(),
            }),
            server: Mutex::new(None),
        }
    }

    /// Configuration this binding was built with.
    pub fn config(&self) -> &WebSocketConfig {
        &self.shared.config
    }

    /// Address the listener is bound to, once started.
    pub fn bound_addr(&self) -> Option<SocketAddr> {
        *self.shared.bound.read()
    }

    /// Number of open WebSocket connections.
    pub fn active_connections(&self) -> usize {
        self.shared.connections.len()
    }

    fn router(&self, handler: SharedHandler) -> Router {
        let state = WsAppState {
            shared: Arc::clone(&self.shared),
            handler,
        };
        Router::new()
            .route("/", get(upgrade))
            .route("/ws", get(upgrade))
            .route(HEALTH_PATH, get(handle_health))
            .with_state(state)
    }
}

async fn upgrade(
    ws: WebSocketUpgrade,
    State(state): State<WsAppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Response {
    let shared = state.shared;
    let connection = Connection {
        id: shared.next_id.fetch_add(1, Ordering::Relaxed),
        peer,
        handler: state.handler,
        heartbeat_interval: shared.config.heartbeat_interval,
        shutdown: shared.shutdown.clone(),
        force: shared.force.clone(),
    };
    debug!(target: CONNECTION_LOG_TARGET, id = connection.id, %peer, "WebSocket upgrade requested");

    let tracker = shared.connections.clone();
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .max_frame_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| tracker.track_future(connection.run(socket)))
}

async fn handle_health(State(state): State<WsAppState>) -> Response {
    let shared = &state.shared;
    health_response(HealthReport::new(
        TransportKind::WebSocket,
        shared.lifecycle.state(),
        shared.connection_info(),
    ))
}

impl TransportBinding for WebSocketTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    fn start(
        &self,
        handler: SharedHandler,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            let lifecycle = &self.shared.lifecycle;
            let _guard = lifecycle.lock_transition().await;
            lifecycle.ensure_startable()?;

            let config = &self.shared.config;
            let listener = bind_listener(&config.host, config.port).await?;
            let server = ServerHandle::spawn(
                listener,
                self.router(handler),
                self.shared.shutdown.clone(),
                lifecycle.clone(),
            )?;

            let local_addr = server.local_addr();
            *self.shared.bound.write() = Some(local_addr);
            *self.server.lock() = Some(server);
            lifecycle.mark_running();

            info!(
                %local_addr,
                heartbeat = ?config.heartbeat_interval,
                "WebSocket transport listening (/, /ws)"
            );
            Ok(())
        })
    }

    fn stop(&self, timeout: Duration) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            let lifecycle = &self.shared.lifecycle;
            let _guard = lifecycle.lock_transition().await;
            if !lifecycle.begin_stop() {
                return Ok(());
            }

            // Every connection sends a going-away close frame on this signal.
            self.shared.shutdown.cancel();
            let server = self.server.lock().take();
            if let Some(server) = server {
                let connections = self.shared.connections.clone();
                server
                    .drain(
                        timeout,
                        async move {
                            connections.close();
                            connections.wait().await;
                        },
                        &self.shared.force,
                    )
                    .await;
            }

            lifecycle.mark_stopped();
            info!("WebSocket transport stopped");
            Ok(())
        })
    }

    fn state(&self) -> LifecycleState {
        self.shared.lifecycle.state()
    }

    fn connection_info(&self) -> ConnectionInfo {
        self.shared.connection_info()
    }

    fn closed(&self) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>> {
        self.shared.lifecycle.closed()
    }
}

/// Factory for creating WebSocket bindings.
#[derive(Debug, Default)]
pub struct WebSocketTransportFactory;

impl WebSocketTransportFactory {
    /// Create a new WebSocket factory.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TransportFactory for WebSocketTransportFactory {
    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    fn create(&self, config: &TransportConfig) -> TransportResult<Box<dyn TransportBinding>> {
        match config {
            TransportConfig::WebSocket(ws) => Ok(Box::new(WebSocketTransport::new(ws.clone()))),
            other => Err(TransportError::UnsupportedTransport(other.kind())),
        }
    }
}
