//! Core transport types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Enumerates the wire protocols a process can be served over.
///
/// The kind is resolved once at startup and never changes for a process run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Standard input/output framing, for subprocess servers.
    Stdio,
    /// HTTP request/response.
    Http,
    /// Full-duplex WebSocket with heartbeat.
    #[serde(alias = "ws")]
    WebSocket,
    /// Server-Sent Events push stream.
    Sse,
}

impl TransportKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 4] = [Self::Stdio, Self::Http, Self::WebSocket, Self::Sse];

    /// Canonical lowercase token, as accepted by `MCP_TRANSPORT` and `--transport`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
            Self::WebSocket => "websocket",
            Self::Sse => "sse",
        }
    }

    /// Whether this kind binds a network listener.
    pub const fn is_network(self) -> bool {
        !matches!(self, Self::Stdio)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a transport token does not name a known kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown transport '{0}' (expected one of: stdio, http, websocket, sse)")]
pub struct UnknownTransportKind(pub String);

impl FromStr for TransportKind {
    type Err = UnknownTransportKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "http" => Ok(Self::Http),
            "websocket" | "ws" => Ok(Self::WebSocket),
            "sse" => Ok(Self::Sse),
            _ => Err(UnknownTransportKind(s.to_string())),
        }
    }
}

/// Lifecycle of a single binding instance.
///
/// ```text
/// Created --start()--> Running --stop()--> Stopping --(drain | timeout)--> Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Constructed but not yet bound.
    #[default]
    Created,
    /// Accepting and serving input.
    Running,
    /// Draining in-flight work after a shutdown request.
    Stopping,
    /// All handles released.
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_kind_display() {
        assert_eq!(TransportKind::Stdio.to_string(), "stdio");
        assert_eq!(TransportKind::Http.to_string(), "http");
        assert_eq!(TransportKind::WebSocket.to_string(), "websocket");
        assert_eq!(TransportKind::Sse.to_string(), "sse");
    }

    #[test]
    fn test_transport_kind_parse() {
        assert_eq!("HTTP".parse::<TransportKind>(), Ok(TransportKind::Http));
        assert_eq!(" ws ".parse::<TransportKind>(), Ok(TransportKind::WebSocket));
        assert_eq!("sse".parse::<TransportKind>(), Ok(TransportKind::Sse));
        assert!("grpc".parse::<TransportKind>().is_err());
    }

    #[test]
    fn test_parse_round_trips_display() {
        for kind in TransportKind::ALL {
            assert_eq!(kind.to_string().parse::<TransportKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_lifecycle_state_default_is_created() {
        assert_eq!(LifecycleState::default(), LifecycleState::Created);
        assert_eq!(LifecycleState::Stopping.to_string(), "stopping");
    }
}
