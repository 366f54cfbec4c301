//! Per-connection tasks for the WebSocket binding.
//!
//! Every accepted socket runs four cooperating duties:
//!
//! - **reader** (the connection future itself): reads frames, records pongs,
//!   queues requests for the dispatcher
//! - **dispatcher**: calls the request handler one message at a time, so
//!   replies leave in request order
//! - **heartbeat**: pings every interval; a ping still unanswered at the next
//!   tick marks the peer dead. A ping that cannot be queued because the
//!   writer is backed up counts as unanswered.
//! - **writer**: sole owner of the socket sink, fed through a channel
//!
//! A per-connection cancellation token joins them: whichever duty ends the
//! connection cancels it and the others wind down. Outside a graceful stop
//! the writer gets one heartbeat interval to flush before it is aborted and
//! the socket dropped.
//!
//! A handler error is logged and produces no frame; the connection keeps
//! serving later requests. Error replies are the handler's to shape.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use gitmcp_transport_traits::{
    CONNECTION_LOG_TARGET, SharedHandler, TransportKind, TransportMessage,
    TransportMessageMetadata,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Frames queued for the writer before senders wait.
const OUTBOUND_BUFFER: usize = 64;
/// Requests queued for the dispatcher before the reader waits.
const INBOUND_BUFFER: usize = 32;

/// Why the reader stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadEnd {
    /// The peer sent a close frame or the stream ended.
    PeerClosed,
    /// Reading failed.
    Failed,
    /// The heartbeat declared the peer dead.
    PeerDead,
    /// The binding is stopping gracefully.
    Shutdown,
    /// The drain budget ran out.
    Forced,
}

impl ReadEnd {
    fn close_frame(self) -> Option<CloseFrame> {
        match self {
            Self::PeerDead => Some(CloseFrame {
                code: close_code::POLICY,
                reason: Utf8Bytes::from_static("heartbeat timeout"),
            }),
            Self::Shutdown => Some(CloseFrame {
                code: close_code::AWAY,
                reason: Utf8Bytes::from_static("server shutting down"),
            }),
            Self::PeerClosed | Self::Failed | Self::Forced => None,
        }
    }
}

/// Everything one connection needs from the binding.
#[derive(Clone)]
pub(crate) struct Connection {
    pub(crate) id: u64,
    pub(crate) peer: SocketAddr,
    pub(crate) handler: SharedHandler,
    pub(crate) heartbeat_interval: Duration,
    pub(crate) shutdown: CancellationToken,
    pub(crate) force: CancellationToken,
}

/// An inbound request and whether its reply should go out as text.
struct Inbound {
    payload: Bytes,
    text: bool,
}

impl Connection {
    fn session_id(&self) -> String {
        format!("ws-{}", self.id)
    }

    /// Serve `socket` until the peer leaves, the heartbeat fails, or the binding stops.
    pub(crate) async fn run(self, socket: WebSocket) {
        let (sink, stream) = socket.split();
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let (requests, requests_rx) = mpsc::channel(INBOUND_BUFFER);
        let token = CancellationToken::new();
        let pong_pending = Arc::new(AtomicBool::new(false));

        debug!(target: CONNECTION_LOG_TARGET, id = self.id, peer = %self.peer, "WebSocket connection opened");

        let writer = tokio::spawn(write_loop(sink, outbound_rx));
        let heartbeat = tokio::spawn(heartbeat_loop(
            self.heartbeat_interval,
            outbound.clone(),
            Arc::clone(&pong_pending),
            token.clone(),
        ));
        let dispatcher = tokio::spawn(self.clone().dispatch_loop(requests_rx, outbound.clone()));

        let end = self.read_loop(stream, requests, &pong_pending, &token).await;
        token.cancel();
        let _ = heartbeat.await;

        match end {
            // Let queued requests finish before saying goodbye.
            ReadEnd::Shutdown => self.join_or_abort_within(dispatcher, None).await,
            _ => dispatcher.abort(),
        }

        if let Some(frame) = end.close_frame() {
            let close = Message::Close(Some(frame));
            if end == ReadEnd::Shutdown {
                tokio::select! {
                    _ = outbound.send(close) => {}
                    () = self.force.cancelled() => {}
                }
            } else if outbound.try_send(close).is_err() {
                debug!(target: CONNECTION_LOG_TARGET, id = self.id, "outbound queue full; closing without close frame");
            }
        }
        drop(outbound);

        let flush_limit = match end {
            ReadEnd::Shutdown => None,
            _ => Some(self.heartbeat_interval),
        };
        self.join_or_abort_within(writer, flush_limit).await;

        debug!(target: CONNECTION_LOG_TARGET, id = self.id, peer = %self.peer, reason = ?end, "WebSocket connection closed");
    }

    /// Wait for `task`, aborting it when the binding is forced down or `limit` elapses.
    async fn join_or_abort_within(&self, mut task: JoinHandle<()>, limit: Option<Duration>) {
        let deadline = async move {
            match limit {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = &mut task => {}
            () = self.force.cancelled() => task.abort(),
            () = deadline => {
                debug!(target: CONNECTION_LOG_TARGET, id = self.id, ?limit, "task did not finish in time; aborting");
                task.abort();
            }
        }
    }

    async fn read_loop(
        &self,
        mut stream: SplitStream<WebSocket>,
        requests: mpsc::Sender<Inbound>,
        pong_pending: &AtomicBool,
        token: &CancellationToken,
    ) -> ReadEnd {
        loop {
            let frame = tokio::select! {
                () = token.cancelled() => return ReadEnd::PeerDead,
                () = self.shutdown.cancelled() => return ReadEnd::Shutdown,
                () = self.force.cancelled() => return ReadEnd::Forced,
                frame = stream.next() => frame,
            };

            let inbound = match frame {
                Some(Ok(Message::Text(text))) => Inbound {
                    payload: Bytes::copy_from_slice(text.as_str().as_bytes()),
                    text: true,
                },
                Some(Ok(Message::Binary(data))) => Inbound {
                    payload: data,
                    text: false,
                },
                Some(Ok(Message::Pong(_))) => {
                    pong_pending.store(false, Ordering::Release);
                    trace!(target: CONNECTION_LOG_TARGET, id = self.id, "pong received");
                    continue;
                }
                // Pings are answered by the protocol layer.
                Some(Ok(Message::Ping(_))) => continue,
                Some(Ok(Message::Close(frame))) => {
                    debug!(target: CONNECTION_LOG_TARGET, id = self.id, ?frame, "peer sent close");
                    return ReadEnd::PeerClosed;
                }
                None => return ReadEnd::PeerClosed,
                Some(Err(e)) => {
                    warn!(target: CONNECTION_LOG_TARGET, id = self.id, error = %e, "WebSocket receive error");
                    return ReadEnd::Failed;
                }
            };

            // Any frame proves the peer is alive.
            pong_pending.store(false, Ordering::Release);

            tokio::select! {
                () = token.cancelled() => return ReadEnd::PeerDead,
                () = self.force.cancelled() => return ReadEnd::Forced,
                sent = requests.send(inbound) => {
                    if sent.is_err() {
                        return ReadEnd::Failed;
                    }
                }
            }
        }
    }

    async fn dispatch_loop(self, mut requests: mpsc::Receiver<Inbound>, outbound: mpsc::Sender<Message>) {
        let session_id = self.session_id();
        while let Some(inbound) = requests.recv().await {
            let message = TransportMessage::with_metadata(
                inbound.payload,
                TransportMessageMetadata::from_transport(TransportKind::WebSocket)
                    .with_content_type("application/json")
                    .with_peer(self.peer.to_string())
                    .with_session_id(session_id.as_str()),
            );

            let reply = match self.handler.handle(message).await {
                Ok(Some(reply)) => reply,
                Ok(None) => continue,
                Err(e) => {
                    warn!(target: CONNECTION_LOG_TARGET, id = self.id, error = %e, "handler failed");
                    continue;
                }
            };

            let frame = match (inbound.text, String::from_utf8(reply.payload.to_vec())) {
                (true, Ok(text)) => Message::Text(text.into()),
                _ => Message::Binary(reply.payload),
            };
            if outbound.send(frame).await.is_err() {
                break;
            }
        }
    }
}

async fn heartbeat_loop(
    interval: Duration,
    outbound: mpsc::Sender<Message>,
    pong_pending: Arc<AtomicBool>,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sequence: u64 = 0;

    loop {
        tokio::select! {
            () = token.cancelled() => return,
            _ = ticker.tick() => {}
        }

        if pong_pending.swap(true, Ordering::AcqRel) {
            debug!(target: CONNECTION_LOG_TARGET, ?interval, "no pong within heartbeat interval; dropping peer");
            token.cancel();
            return;
        }

        sequence += 1;
        let ping = Message::Ping(Bytes::from(sequence.to_be_bytes().to_vec()));
        match outbound.try_send(ping) {
            Ok(()) => {}
            // Left pending: the next tick treats the peer as dead.
            Err(mpsc::error::TrySendError::Full(_)) => {
                trace!(target: CONNECTION_LOG_TARGET, sequence, "outbound queue full; ping skipped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => return,
        }
    }
}

async fn write_loop(mut sink: SplitSink<WebSocket, Message>, mut outbound: mpsc::Receiver<Message>) {
    while let Some(frame) = outbound.recv().await {
        let closing = matches!(frame, Message::Close(_));
        if let Err(e) = sink.send(frame).await {
            debug!(target: CONNECTION_LOG_TARGET, error = %e, "WebSocket send failed");
            return;
        }
        if closing {
            break;
        }
    }
    let _ = sink.close().await;
}
