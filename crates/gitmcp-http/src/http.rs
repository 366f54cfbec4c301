//! HTTP request/response binding.
//!
//! - POST `/` or `/mcp`: the body goes to the request handler; 200 with the
//!   reply, or 202 with an empty body when the handler has nothing to say
//! - GET `<health_path>`: 200 with a JSON health document while running, 503 otherwise

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, DefaultBodyLimit, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use gitmcp_transport_traits::{
    CONNECTION_LOG_TARGET, ConnectionInfo, HttpConfig, Lifecycle, LifecycleState,
    MAX_MESSAGE_SIZE, SharedHandler, TransportBinding, TransportConfig, TransportError,
    TransportFactory, TransportKind, TransportMessage, TransportMessageMetadata, TransportResult,
};
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cors::cors_layer;
use crate::server::{ServerHandle, bind_listener, health_response, normalize_path};

const JSON_CONTENT_TYPE: &str = "application/json";

/// State shared between the binding and its route handlers.
#[derive(Debug)]
struct HttpShared {
    config: HttpConfig,
    lifecycle: Lifecycle,
    bound: RwLock<Option<SocketAddr>>,
    shutdown: CancellationToken,
    force: CancellationToken,
}

impl HttpShared {
    fn connection_info(&self) -> ConnectionInfo {
        let port = self.bound.read().map_or(self.config.port, |addr| addr.port());
        let base = format!("http://{}:{}", self.config.host, port);
        let health_path = normalize_path(&self.config.health_path);
        ConnectionInfo::new(TransportKind::Http)
            .with("state", self.lifecycle.state())
            .with("host", self.config.host.as_str())
            .with("port", port)
            .with("url", format!("{base}/mcp"))
            .with("health_url", format!("{base}{health_path}"))
            .with("cors_origins", self.config.cors_origins.join(","))
    }
}

#[derive(Clone)]
struct HttpAppState {
    shared: Arc<HttpShared>,
    handler: SharedHandler,
}

/// HTTP transport binding.
#[derive(Debug)]
pub struct HttpTransport {
    shared: Arc<HttpShared>,
    server: Mutex<Option<ServerHandle>>,
}

impl HttpTransport {
    /// Create a binding for `config`. Nothing is bound until `start()`.
    #[must_use]
    pub fn new(config: HttpConfig) -> Self {
        Self {
            shared: Arc::new(HttpShared {
                config,
                lifecycle: Lifecycle::new(TransportKind::Http),
                bound: RwLock::new(None),
                shutdown: CancellationToken::new(),
                force: CancellationToken::new(),
            }),
            server: Mutex::new(None),
        }
    }

    /// Configuration this binding was built with.
    pub fn config(&self) -> &HttpConfig {
        &self.shared.config
    }

    /// Address the listener is bound to, once started.
    pub fn bound_addr(&self) -> Option<SocketAddr> {
        *self.shared.bound.read()
    }

    fn router(&self, handler: SharedHandler) -> Router {
        let state = HttpAppState {
            shared: Arc::clone(&self.shared),
            handler,
        };
        let health_path = normalize_path(&self.shared.config.health_path);

        let router = Router::new()
            .route("/", post(handle_message))
            .route("/mcp", post(handle_message))
            .route(&health_path, get(handle_health))
            .layer(DefaultBodyLimit::max(MAX_MESSAGE_SIZE))
            .with_state(state);

        match cors_layer(&self.shared.config.cors_origins) {
            Some(cors) => router.layer(cors),
            None => router,
        }
    }
}

async fn handle_message(
    State(state): State<HttpAppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(JSON_CONTENT_TYPE);
    let message = TransportMessage::with_metadata(
        body,
        TransportMessageMetadata::from_transport(TransportKind::Http)
            .with_content_type(content_type)
            .with_peer(peer.to_string()),
    );
    debug!(target: CONNECTION_LOG_TARGET, %peer, size = message.size(), "http request");

    let result = tokio::select! {
        () = state.shared.force.cancelled() => {
            return (StatusCode::SERVICE_UNAVAILABLE, "server shutting down").into_response();
        }
        result = state.handler.handle(message) => result,
    };

    match result {
        Ok(Some(reply)) => {
            let content_type = reply
                .content_type()
                .unwrap_or(JSON_CONTENT_TYPE)
                .to_string();
            ([(header::CONTENT_TYPE, content_type)], reply.payload).into_response()
        }
        Ok(None) => StatusCode::ACCEPTED.into_response(),
        Err(TransportError::Decode(reason)) => {
            debug!(target: CONNECTION_LOG_TARGET, %peer, %reason, "rejecting undecodable body");
            (StatusCode::BAD_REQUEST, reason).into_response()
        }
        Err(e) => {
            warn!(target: CONNECTION_LOG_TARGET, %peer, error = %e, "handler failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn handle_health(State(state): State<HttpAppState>) -> Response {
    let shared = &state.shared;
    health_response(gitmcp_transport_traits::HealthReport::new(
        TransportKind::Http,
        shared.lifecycle.state(),
        shared.connection_info(),
    ))
}

impl TransportBinding for HttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
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
                health = %normalize_path(&config.health_path),
                "HTTP transport listening (POST /, /mcp)"
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

            self.shared.shutdown.cancel();
            let server = self.server.lock().take();
            if let Some(server) = server {
                server.drain(timeout, async {}, &self.shared.force).await;
            }

            lifecycle.mark_stopped();
            info!("HTTP transport stopped");
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

/// Factory for creating HTTP bindings.
#[derive(Debug, Default)]
pub struct HttpTransportFactory;

impl HttpTransportFactory {
    /// Create a new HTTP factory.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TransportFactory for HttpTransportFactory {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    fn create(&self, config: &TransportConfig) -> TransportResult<Box<dyn TransportBinding>> {
        match config {
            TransportConfig::Http(http) => Ok(Box::new(HttpTransport::new(http.clone()))),
            other => Err(TransportError::UnsupportedTransport(other.kind())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_connection_info_before_start() {
        let transport = HttpTransport::new(
            HttpConfig::new("127.0.0.1", 9040).with_cors_origins(["https://a.example"]),
        );
        let info = transport.connection_info();
        assert_eq!(info.protocol(), Some("http"));
        assert_eq!(info.get_number("port"), Some(9040));
        assert_eq!(info.get_str("url"), Some("http://127.0.0.1:9040/mcp"));
        assert_eq!(
            info.get_str("health_url"),
            Some("http://127.0.0.1:9040/health")
        );
        assert_eq!(info.get_str("cors_origins"), Some("https://a.example"));
        assert_eq!(info.get_str("state"), Some("created"));
        assert!(transport.bound_addr().is_none());
    }

    #[test]
    fn test_factory_kind_mismatch() {
        let factory = HttpTransportFactory::new();
        assert!(
            factory
                .create(&TransportConfig::default_for(TransportKind::Http))
                .is_ok()
        );
        assert!(matches!(
            factory.create(&TransportConfig::default_for(TransportKind::Sse)),
            Err(TransportError::UnsupportedTransport(TransportKind::Sse))
        ));
    }
}
