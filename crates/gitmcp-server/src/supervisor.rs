//! Lifecycle supervision.
//!
//! The [`Supervisor`] owns the single active binding. It starts it, waits for
//! the first of Ctrl+C, SIGTERM, a [`ShutdownHandle`] request, or the binding
//! ending on its own, then stops it within the configured drain budget.

use std::fmt;
use std::time::Duration;

use gitmcp_transport_traits::{HealthReport, SharedHandler, TransportBinding};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ServerSettings;
use crate::error::{ServerError, ServerResult};
use crate::registry::TransportRegistry;

/// Handle for triggering graceful shutdown from outside the supervisor.
///
/// Cloneable; every clone controls the same supervisor.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    /// Request graceful shutdown. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once shutdown has been requested.
    pub async fn requested(&self) {
        self.token.cancelled().await;
    }
}

/// Why the supervisor stopped the binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// [`ShutdownHandle::shutdown`] was called.
    Requested,
    /// The binding stopped serving on its own (stdin EOF, listener failure).
    BindingClosed,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interrupt => "interrupt",
            Self::Terminate => "terminate",
            Self::Requested => "requested",
            Self::BindingClosed => "binding closed",
        })
    }
}

/// Drives one binding through start, serve and graceful stop.
#[derive(Debug)]
pub struct Supervisor {
    binding: Box<dyn TransportBinding>,
    shutdown_timeout: Duration,
    shutdown: ShutdownHandle,
    handle_signals: bool,
}

impl Supervisor {
    /// Supervise `binding`, stopping it within `shutdown_timeout`.
    pub fn new(binding: Box<dyn TransportBinding>, shutdown_timeout: Duration) -> Self {
        Self {
            binding,
            shutdown_timeout,
            shutdown: ShutdownHandle::default(),
            handle_signals: true,
        }
    }

    /// Build the binding named by `settings` from `registry`.
    ///
    /// # Errors
    ///
    /// [`ServerError::Transport`] with `UnsupportedTransport` when the registry
    /// has no factory for the resolved kind.
    pub fn from_settings(registry: &TransportRegistry, settings: &ServerSettings) -> ServerResult<Self> {
        let binding = registry.create(&settings.transport)?;
        Ok(Self::new(binding, settings.shutdown_timeout))
    }

    /// Whether to listen for Ctrl+C and SIGTERM (on by default).
    #[must_use]
    pub fn with_signal_handlers(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// A handle that triggers graceful shutdown.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// The supervised binding.
    pub fn binding(&self) -> &dyn TransportBinding {
        self.binding.as_ref()
    }

    /// Drain budget used by [`stop`](Self::stop).
    pub const fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Current health of the binding.
    pub fn health(&self) -> HealthReport {
        self.binding.health()
    }

    /// Start the binding.
    ///
    /// # Errors
    ///
    /// Whatever the binding's `start()` fails with, for example a bind failure.
    pub async fn start(&self, handler: SharedHandler) -> ServerResult<()> {
        self.binding.start(handler).await?;
        let info = self.binding.connection_info();
        info!(
            transport = %self.binding.kind(),
            url = info.get_str("url").unwrap_or("stdio"),
            "transport started"
        );
        Ok(())
    }

    /// Wait for the first shutdown trigger.
    ///
    /// # Errors
    ///
    /// [`ServerError::Signal`] when signal handlers cannot be installed.
    pub async fn wait(&self) -> ServerResult<ShutdownReason> {
        let signals = if self.handle_signals {
            Some(Signals::install()?)
        } else {
            None
        };

        let reason = tokio::select! {
            reason = wait_for_signal(signals) => reason,
            () = self.shutdown.requested() => ShutdownReason::Requested,
            () = self.binding.closed() => ShutdownReason::BindingClosed,
        };
        info!(%reason, "shutdown triggered");
        Ok(reason)
    }

    /// Stop the binding, draining for up to the configured timeout.
    ///
    /// # Errors
    ///
    /// Whatever the binding's `stop()` fails with.
    pub async fn stop(&self) -> ServerResult<()> {
        self.binding.stop(self.shutdown_timeout).await?;
        info!(transport = %self.binding.kind(), "transport stopped");
        Ok(())
    }

    /// Start, wait for a shutdown trigger, stop.
    ///
    /// # Errors
    ///
    /// Startup failures, signal installation failures, and stop failures.
    pub async fn run(&self, handler: SharedHandler) -> ServerResult<ShutdownReason> {
        self.start(handler).await?;
        let reason = match self.wait().await {
            Ok(reason) => reason,
            Err(e) => {
                let _ = self.stop().await;
                return Err(e);
            }
        };
        self.stop().await?;
        Ok(reason)
    }
}

/// OS signal listeners, installed before waiting.
struct Signals {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl Signals {
    fn install() -> ServerResult<Self> {
        Ok(Self {
            #[cfg(unix)]
            terminate: tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .map_err(ServerError::Signal)?,
        })
    }
}

async fn wait_for_signal(signals: Option<Signals>) -> ShutdownReason {
    let Some(signals) = signals else {
        return std::future::pending().await;
    };

    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => ShutdownReason::Interrupt,
            Err(e) => {
                warn!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    {
        let mut signals = signals;
        tokio::select! {
            reason = interrupt => reason,
            _ = signals.terminate.recv() => ShutdownReason::Terminate,
        }
    }

    #[cfg(not(unix))]
    {
        let _ = signals;
        interrupt.await
    }
}
