//! Standard I/O transport binding.
//!
//! This module provides the [`StdioTransport`] implementation: one sequential
//! task reads a frame from stdin, hands it to the request handler, writes the
//! reply to stdout, flushes, and only then reads the next frame.
//!
//! # Interior Mutability Pattern
//!
//! - **parking_lot::Mutex** for the stream slot and task handle (short-lived locks, never cross .await)
//! - **AtomicBool** for the stream health flag read by `connection_info()`
//! - **Lifecycle** (tokio mutex inside) to serialise `start` and `stop`

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use gitmcp_transport_traits::{
    CONNECTION_LOG_TARGET, ConnectionInfo, Lifecycle, LifecycleState, SharedHandler, StdioConfig,
    TransportBinding, TransportConfig, TransportError, TransportFactory, TransportKind,
    TransportMessage, TransportMessageMetadata, TransportResult, drain_within,
};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::codec::{Frame, StdioCodec};

// Boxed async I/O so process stdio and in-memory pipes share one code path
type BoxedAsyncRead = Pin<Box<dyn AsyncRead + Send + 'static>>;
type BoxedAsyncWrite = Pin<Box<dyn AsyncWrite + Send + 'static>>;

/// Source of the byte streams the binding serves.
enum StreamSource {
    /// The current process's stdin/stdout.
    ProcessStdio,
    /// Caller supplied streams, consumed by `start()`.
    Raw {
        reader: BoxedAsyncRead,
        writer: BoxedAsyncWrite,
    },
    /// Streams were handed to the serving task.
    Taken,
}

impl std::fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProcessStdio => write!(f, "ProcessStdio"),
            Self::Raw { .. } => write!(f, "Raw"),
            Self::Taken => write!(f, "Taken"),
        }
    }
}

/// Stdio transport binding.
///
/// # Examples
///
/// ```rust,no_run
/// use gitmcp_stdio::StdioTransport;
/// use gitmcp_transport_traits::{StdioConfig, TransportBinding, TransportMessage, handler_fn};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = StdioTransport::new(StdioConfig::default());
/// transport
///     .start(handler_fn(|msg: TransportMessage| async move { Ok(Some(msg)) }))
///     .await?;
/// transport.closed().await;
/// transport.stop(std::time::Duration::from_secs(5)).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct StdioTransport {
    config: StdioConfig,
    lifecycle: Lifecycle,
    source: Mutex<StreamSource>,
    task: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
    streams_open: Arc<AtomicBool>,
}

impl StdioTransport {
    /// Create a binding over the current process's stdin/stdout.
    #[must_use]
    pub fn new(config: StdioConfig) -> Self {
        Self::from_source(config, StreamSource::ProcessStdio)
    }

    /// Create a binding over arbitrary async streams.
    ///
    /// `reader` is where frames come from, `writer` is where replies go. Tests
    /// use the two ends of `tokio::io::duplex` pipes.
    pub fn with_io<R, W>(config: StdioConfig, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + 'static,
        W: AsyncWrite + Send + 'static,
    {
        Self::from_source(
            config,
            StreamSource::Raw {
                reader: Box::pin(reader),
                writer: Box::pin(writer),
            },
        )
    }

    fn from_source(config: StdioConfig, source: StreamSource) -> Self {
        Self {
            config,
            lifecycle: Lifecycle::new(TransportKind::Stdio),
            source: Mutex::new(source),
            task: Mutex::new(None),
            shutdown: CancellationToken::new(),
            streams_open: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Configuration this binding was built with.
    pub const fn config(&self) -> &StdioConfig {
        &self.config
    }

    fn take_streams(&self) -> TransportResult<(BoxedAsyncRead, BoxedAsyncWrite)> {
        let mut source = self.source.lock();
        match std::mem::replace(&mut *source, StreamSource::Taken) {
            StreamSource::ProcessStdio => Ok((
                Box::pin(tokio::io::stdin()),
                Box::pin(tokio::io::stdout()),
            )),
            StreamSource::Raw { reader, writer } => Ok((reader, writer)),
            StreamSource::Taken => Err(TransportError::Internal(
                "stdio streams already consumed".to_string(),
            )),
        }
    }
}

/// Everything the serving task needs, moved into it at `start()`.
struct ServeLoop {
    reader: BoxedAsyncRead,
    writer: BoxedAsyncWrite,
    codec: StdioCodec,
    handler: SharedHandler,
    shutdown: CancellationToken,
    lifecycle: Lifecycle,
    streams_open: Arc<AtomicBool>,
}

impl ServeLoop {
    async fn run(self) {
        let mut frames = FramedRead::new(self.reader, self.codec.clone());
        let mut sink = FramedWrite::new(self.writer, self.codec);

        loop {
            let next = tokio::select! {
                () = self.shutdown.cancelled() => {
                    debug!("stdio read loop cancelled");
                    break;
                }
                next = frames.next() => next,
            };

            let payload = match next {
                None => {
                    info!("stdin reached EOF");
                    break;
                }
                Some(Ok(Frame::Message(payload))) => payload,
                Some(Ok(Frame::Oversized(len))) => {
                    let err = TransportError::Connection(format!(
                        "dropped {len} byte stdin frame over the size limit"
                    ));
                    warn!(target: CONNECTION_LOG_TARGET, error = %err, "stdio frame rejected");
                    continue;
                }
                Some(Err(e)) => {
                    error!(target: CONNECTION_LOG_TARGET, error = %e, "failed to read from stdin");
                    break;
                }
            };

            trace!(target: CONNECTION_LOG_TARGET, size = payload.len(), "stdio frame received");
            let message = TransportMessage::with_metadata(
                payload,
                TransportMessageMetadata::from_transport(TransportKind::Stdio)
                    .with_content_type("application/json"),
            );

            match self.handler.handle(message).await {
                Ok(Some(reply)) => {
                    // An unframeable reply loses only its own exchange.
                    if let Err(e) = sink.encoder().check_encodable(&reply.payload) {
                        let err = TransportError::Connection(format!(
                            "dropped {} byte reply: {e}",
                            reply.size()
                        ));
                        warn!(target: CONNECTION_LOG_TARGET, error = %err, "stdio reply rejected");
                        continue;
                    }
                    if let Err(e) = sink.send(reply.payload).await {
                        error!(target: CONNECTION_LOG_TARGET, error = %e, "failed to write to stdout");
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(target: CONNECTION_LOG_TARGET, error = %e, "handler failed; continuing");
                }
            }
        }

        self.streams_open.store(false, Ordering::Release);
        self.lifecycle.notify_closed();
    }
}

impl TransportBinding for StdioTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Stdio
    }

    fn start(
        &self,
        handler: SharedHandler,
    ) -> Pin<Box<dyn std::future::Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            let _guard = self.lifecycle.lock_transition().await;
            self.lifecycle.ensure_startable()?;

            let (reader, writer) = self.take_streams()?;
            self.streams_open.store(true, Ordering::Release);

            let serve = ServeLoop {
                reader,
                writer,
                codec: StdioCodec::new(self.config.framing),
                handler,
                shutdown: self.shutdown.clone(),
                lifecycle: self.lifecycle.clone(),
                streams_open: Arc::clone(&self.streams_open),
            };
            *self.task.lock() = Some(tokio::spawn(serve.run()));

            self.lifecycle.mark_running();
            info!(framing = self.config.framing.as_str(), "stdio transport started");
            Ok(())
        })
    }

    fn stop(
        &self,
        timeout: Duration,
    ) -> Pin<Box<dyn std::future::Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            let _guard = self.lifecycle.lock_transition().await;
            if !self.lifecycle.begin_stop() {
                return Ok(());
            }

            self.shutdown.cancel();
            let task = self.task.lock().take();
            if let Some(mut task) = task {
                let drained = drain_within(timeout, async {
                    let _ = (&mut task).await;
                })
                .await;
                if let Err(e) = drained {
                    warn!(error = %e, "stdio handler still busy; aborting");
                    task.abort();
                }
            }

            self.streams_open.store(false, Ordering::Release);
            self.lifecycle.mark_stopped();
            info!("stdio transport stopped");
            Ok(())
        })
    }

    fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    fn connection_info(&self) -> ConnectionInfo {
        let state = self.lifecycle.state();
        let streams_open = self.streams_open.load(Ordering::Acquire);
        ConnectionInfo::new(TransportKind::Stdio)
            .with("state", state)
            .with("framing", self.config.framing.as_str())
            .with(
                "stdio_healthy",
                state == LifecycleState::Running && streams_open,
            )
    }

    fn closed(&self) -> Pin<Box<dyn std::future::Future<Output = ()> + Send + 'static>> {
        self.lifecycle.closed()
    }
}

/// Factory for creating stdio bindings.
#[derive(Debug, Default)]
pub struct StdioTransportFactory;

impl StdioTransportFactory {
    /// Create a new stdio factory.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TransportFactory for StdioTransportFactory {
    fn kind(&self) -> TransportKind {
        TransportKind::Stdio
    }

    fn create(&self, config: &TransportConfig) -> TransportResult<Box<dyn TransportBinding>> {
        match config {
            TransportConfig::Stdio(stdio) => Ok(Box::new(StdioTransport::new(stdio.clone()))),
            other => Err(TransportError::UnsupportedTransport(other.kind())),
        }
    }
}
