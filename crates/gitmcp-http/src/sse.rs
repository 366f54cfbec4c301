//! Server-Sent-Events binding.
//!
//! Each `GET /sse` opens a session with its own bounded channel. The stream
//! starts with an `endpoint` event naming the URL the client must POST to
//! (`/messages?session_id=<id>`), followed by one `message` event per reply in
//! the order the replies were produced. Sessions are independent: closing one
//! client removes only its entry.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, DefaultBodyLimit, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use dashmap::DashMap;
use futures::stream::Stream;
use gitmcp_transport_traits::{
    CONNECTION_LOG_TARGET, ConnectionInfo, HealthReport, Lifecycle, LifecycleState,
    MAX_MESSAGE_SIZE, SharedHandler, SseConfig, TransportBinding, TransportConfig, TransportError,
    TransportFactory, TransportKind, TransportMessage, TransportMessageMetadata, TransportResult,
};
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cors::cors_layer;
use crate::server::{ServerHandle, bind_listener, health_response, normalize_path};

/// Path clients open the event stream on.
pub const SSE_PATH: &str = "/sse";
/// Path clients POST messages to.
pub const MESSAGES_PATH: &str = "/messages";

/// Events buffered per session before senders wait.
const SESSION_BUFFER: usize = 64;
/// Keep-alive comment interval.
const SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Map of session ID to the sender feeding that session's stream.
#[derive(Debug, Default)]
struct SessionRegistry {
    sessions: DashMap<String, mpsc::Sender<String>>,
}

impl SessionRegistry {
    fn open(&self) -> (String, mpsc::Receiver<String>) {
        let session_id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(SESSION_BUFFER);
        self.sessions.insert(session_id.clone(), tx);
        (session_id, rx)
    }

    fn sender(&self, session_id: &str) -> Option<mpsc::Sender<String>> {
        self.sessions.get(session_id).map(|entry| entry.value().clone())
    }

    fn remove(&self, session_id: &str) {
        if self.sessions.remove(session_id).is_some() {
            debug!(target: CONNECTION_LOG_TARGET, %session_id, "SSE session closed");
        }
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }

    fn senders(&self) -> Vec<(String, mpsc::Sender<String>)> {
        self.sessions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

/// State shared between the binding and its route handlers.
#[derive(Debug)]
struct SseShared {
    config: SseConfig,
    lifecycle: Lifecycle,
    bound: RwLock<Option<SocketAddr>>,
    sessions: SessionRegistry,
    shutdown: CancellationToken,
    force: CancellationToken,
}

impl SseShared {
    fn connection_info(&self) -> ConnectionInfo {
        let port = self.bound.read().map_or(self.config.port, |addr| addr.port());
        let base = format!("http://{}:{}", self.config.host, port);
        let health_path = normalize_path(&self.config.health_path);
        ConnectionInfo::new(TransportKind::Sse)
            .with("state", self.lifecycle.state())
            .with("host", self.config.host.as_str())
            .with("port", port)
            .with("url", base.as_str())
            .with("sse_url", format!("{base}{SSE_PATH}"))
            .with("messages_url", format!("{base}{MESSAGES_PATH}"))
            .with("health_url", format!("{base}{health_path}"))
            .with("cors_origins", self.config.cors_origins.join(","))
            .with("active_sessions", self.sessions.len())
    }
}

#[derive(Clone)]
struct SseAppState {
    shared: Arc<SseShared>,
    handler: SharedHandler,
}

/// Server-Sent-Events transport binding.
#[derive(Debug)]
pub struct SseTransport {
    shared: Arc<SseShared>,
    server: Mutex<Option<ServerHandle>>,
}

impl SseTransport {
    /// Create a binding for `config`. Nothing is bound until `start()`.
    #[must_use]
    pub fn new(config: SseConfig) -> Self {
        Self {
            shared: Arc::new(SseShared {
                config,
                lifecycle: Lifecycle::new(TransportKind::Sse),
                bound: RwLock::new(None),
                sessions: SessionRegistry::default(),
                shutdown: CancellationToken::new(),
                force: CancellationToken::new(),
            }),
            server: Mutex::new(None),
        }
    }

    /// Configuration this binding was built with.
    pub fn config(&self) -> &SseConfig {
        &self.shared.config
    }

    /// Address the listener is bound to, once started.
    pub fn bound_addr(&self) -> Option<SocketAddr> {
        *self.shared.bound.read()
    }

    /// Number of open event streams.
    pub fn active_sessions(&self) -> usize {
        self.shared.sessions.len()
    }

    /// Push a server-originated `message` event onto one session's stream.
    pub async fn publish(&self, session_id: &str, payload: impl Into<String>) -> TransportResult<()> {
        let sender = self.shared.sessions.sender(session_id).ok_or_else(|| {
            TransportError::Connection(format!("unknown SSE session {session_id}"))
        })?;
        sender
            .send(payload.into())
            .await
            .map_err(|_| TransportError::Connection(format!("SSE session {session_id} closed")))
    }

    /// Push a `message` event onto every open stream. Returns how many sessions got it.
    pub async fn broadcast(&self, payload: impl Into<String>) -> usize {
        let payload = payload.into();
        let mut delivered = 0;
        for (session_id, sender) in self.shared.sessions.senders() {
            if sender.send(payload.clone()).await.is_ok() {
                delivered += 1;
            } else {
                debug!(target: CONNECTION_LOG_TARGET, %session_id, "broadcast skipped closed session");
            }
        }
        delivered
    }

    fn router(&self, handler: SharedHandler) -> Router {
        let state = SseAppState {
            shared: Arc::clone(&self.shared),
            handler,
        };
        let health_path = normalize_path(&self.shared.config.health_path);

        let router = Router::new()
            .route(SSE_PATH, get(open_stream))
            .route(MESSAGES_PATH, post(post_message))
            .route(&health_path, get(handle_health))
            .layer(DefaultBodyLimit::max(MAX_MESSAGE_SIZE))
            .with_state(state);

        match cors_layer(&self.shared.config.cors_origins) {
            Some(cors) => router.layer(cors),
            None => router,
        }
    }
}

/// SSE `data` lines may not carry carriage returns.
fn event_data(payload: &str) -> String {
    if payload.contains('\r') {
        payload.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        payload.to_string()
    }
}

async fn open_stream(
    State(state): State<SseAppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    let shared = state.shared;
    let (session_id, mut rx) = shared.sessions.open();
    debug!(target: CONNECTION_LOG_TARGET, %peer, %session_id, "SSE session opened");

    let endpoint = format!("{MESSAGES_PATH}?session_id={session_id}");
    let shutdown = shared.shutdown.clone();

    let stream = async_stream::stream! {
        yield Ok::<_, Infallible>(Event::default().event("endpoint").data(endpoint));

        loop {
            let next = tokio::select! {
                () = shutdown.cancelled() => None,
                next = rx.recv() => next,
            };
            let Some(payload) = next else {
                break;
            };
            yield Ok(Event::default().event("message").data(event_data(&payload)));
        }
    };

    // Remove the session when the client goes away or the stream ends
    let stream = CleanupStream {
        inner: Box::pin(stream),
        shared,
        session_id,
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(SSE_KEEP_ALIVE)
            .text("keep-alive"),
    )
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    session_id: Option<String>,
}

async fn post_message(
    State(state): State<SseAppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(query): Query<SessionQuery>,
    body: Bytes,
) -> Response {
    let Some(session_id) = query.session_id.filter(|id| !id.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "missing session_id").into_response();
    };
    let Some(sender) = state.shared.sessions.sender(&session_id) else {
        return (StatusCode::NOT_FOUND, "unknown session").into_response();
    };

    let message = TransportMessage::with_metadata(
        body,
        TransportMessageMetadata::from_transport(TransportKind::Sse)
            .with_content_type("application/json")
            .with_peer(peer.to_string())
            .with_session_id(session_id.as_str()),
    );

    let result = tokio::select! {
        () = state.shared.force.cancelled() => {
            return (StatusCode::SERVICE_UNAVAILABLE, "server shutting down").into_response();
        }
        result = state.handler.handle(message) => result,
    };

    let reply = match result {
        Ok(Some(reply)) => reply,
        Ok(None) => return StatusCode::ACCEPTED.into_response(),
        Err(TransportError::Decode(reason)) => {
            return (StatusCode::BAD_REQUEST, reason).into_response();
        }
        Err(e) => {
            warn!(target: CONNECTION_LOG_TARGET, %session_id, error = %e, "handler failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    // Event data is text; a binary reply is refused rather than rewritten.
    let Ok(payload) = String::from_utf8(reply.payload.to_vec()) else {
        warn!(target: CONNECTION_LOG_TARGET, %session_id, size = reply.size(), "reply is not valid UTF-8");
        return (StatusCode::INTERNAL_SERVER_ERROR, "reply is not valid UTF-8").into_response();
    };
    let sent = tokio::select! {
        () = state.shared.force.cancelled() => false,
        sent = sender.send(payload) => sent.is_ok(),
    };
    if sent {
        StatusCode::ACCEPTED.into_response()
    } else {
        (StatusCode::NOT_FOUND, "session closed").into_response()
    }
}

async fn handle_health(State(state): State<SseAppState>) -> Response {
    let shared = &state.shared;
    health_response(HealthReport::new(
        TransportKind::Sse,
        shared.lifecycle.state(),
        shared.connection_info(),
    ))
}

/// Stream wrapper that removes the session when dropped.
struct CleanupStream<S> {
    inner: Pin<Box<S>>,
    shared: Arc<SseShared>,
    session_id: String,
}

impl<S: Stream<Item = Result<Event, Infallible>>> Stream for CleanupStream<S> {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl<S> Drop for CleanupStream<S> {
    fn drop(&mut self) {
        self.shared.sessions.remove(&self.session_id);
    }
}

impl TransportBinding for SseTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Sse
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

            info!(%local_addr, "SSE transport listening (GET {SSE_PATH}, POST {MESSAGES_PATH})");
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

            // Ends every event stream, letting the HTTP connections finish.
            self.shared.shutdown.cancel();
            let server = self.server.lock().take();
            if let Some(server) = server {
                server.drain(timeout, async {}, &self.shared.force).await;
            }

            lifecycle.mark_stopped();
            info!("SSE transport stopped");
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

/// Factory for creating SSE bindings.
#[derive(Debug, Default)]
pub struct SseTransportFactory;

impl SseTransportFactory {
    /// Create a new SSE factory.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TransportFactory for SseTransportFactory {
    fn kind(&self) -> TransportKind {
        TransportKind::Sse
    }

    fn create(&self, config: &TransportConfig) -> TransportResult<Box<dyn TransportBinding>> {
        match config {
            TransportConfig::Sse(sse) => Ok(Box::new(SseTransport::new(sse.clone()))),
            other => Err(TransportError::UnsupportedTransport(other.kind())),
        }
    }
}
