//! Transport error types.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::types::{LifecycleState, TransportKind};

/// A specialized `Result` type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Represents errors that can occur while running a transport binding.
///
/// Startup-class errors ([`UnsupportedTransport`](Self::UnsupportedTransport),
/// [`Bind`](Self::Bind)) are fatal for the process. Per-connection errors
/// ([`Connection`](Self::Connection), [`Handler`](Self::Handler),
/// [`Decode`](Self::Decode)) never leave the binding that produced them.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum TransportError {
    /// No constructor is registered for the requested transport kind.
    #[error("Unsupported transport: {0}")]
    UnsupportedTransport(TransportKind),

    /// `start()` was called on a binding that is not in the `Created` state.
    #[error("{kind} transport is already {state}; start() may only be called once")]
    AlreadyRunning {
        /// Kind of the binding that was misused
        kind: TransportKind,
        /// State the binding was in when `start()` was called
        state: LifecycleState,
    },

    /// The listening socket could not be bound.
    #[error("Failed to bind {addr}: {reason}")]
    Bind {
        /// The offending `host:port`
        addr: String,
        /// Human readable cause (e.g. "port 9040 already in use")
        reason: String,
    },

    /// I/O failure on a single connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Graceful stop exceeded its budget and remaining work was cancelled.
    #[error("Drain timed out after {0:?}; remaining connections were force-closed")]
    DrainTimeout(Duration),

    /// The request handler failed to process a message.
    #[error("Handler error: {0}")]
    Handler(String),

    /// An inbound frame could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// An underlying I/O error occurred.
    #[error("IO error: {0}")]
    Io(String),

    /// An unexpected internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TransportError {
    /// Build a [`TransportError::Bind`] from the I/O error returned by the listener.
    ///
    /// Address-in-use failures get a short, user-facing reason naming the port.
    pub fn bind(host: &str, port: u16, err: &io::Error) -> Self {
        let reason = match err.kind() {
            io::ErrorKind::AddrInUse => format!("port {port} already in use"),
            io::ErrorKind::PermissionDenied => {
                format!("permission denied binding port {port}")
            }
            io::ErrorKind::AddrNotAvailable => format!("address {host} is not available"),
            _ => err.to_string(),
        };
        Self::Bind {
            addr: format!("{host}:{port}"),
            reason,
        }
    }

    /// Returns `true` for errors that must abort the process at startup.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::UnsupportedTransport(_) | Self::Bind { .. })
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
