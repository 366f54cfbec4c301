//! Per-binding configuration.
//!
//! These are the validated, strongly typed settings a binding is constructed
//! from. Merging environment, file and CLI layers into one of these happens in
//! the server crate's resolver; nothing untyped crosses into a binding.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::TransportKind;

/// Wildcard bind address used when no host is configured.
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default HTTP port.
pub const DEFAULT_HTTP_PORT: u16 = 8000;
/// Default WebSocket port.
pub const DEFAULT_WEBSOCKET_PORT: u16 = 8001;
/// Default SSE port.
pub const DEFAULT_SSE_PORT: u16 = 8003;
/// Default WebSocket heartbeat interval.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// Default HTTP health path.
pub const DEFAULT_HTTP_HEALTH_PATH: &str = "/health";
/// Default SSE health path.
pub const DEFAULT_SSE_HEALTH_PATH: &str = "/healthz";

fn wildcard_origins() -> Vec<String> {
    vec!["*".to_string()]
}

/// How the stdio binding splits its input stream into messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StdioFraming {
    /// One message per line.
    #[default]
    Newline,
    /// `Content-Length: N` header block followed by an N byte body.
    ContentLength,
}

impl StdioFraming {
    /// Token reported in connection info.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newline => "newline",
            Self::ContentLength => "content-length",
        }
    }
}

/// Stdio binding configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdioConfig {
    /// Input framing.
    #[serde(default)]
    pub framing: StdioFraming,
}

/// HTTP binding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Allowed cross-origin values. Empty disables CORS, `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// Path of the health endpoint.
    pub health_path: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_HTTP_PORT,
            cors_origins: wildcard_origins(),
            health_path: DEFAULT_HTTP_HEALTH_PATH.to_string(),
        }
    }
}

impl HttpConfig {
    /// Create a config for `host:port` with the remaining fields defaulted.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Replace the CORS allow-list.
    pub fn with_cors_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cors_origins = origins.into_iter().map(Into::into).collect();
        self
    }
}

/// WebSocket binding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSocketConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Interval between keepalive pings; a peer that misses one full interval is dropped.
    pub heartbeat_interval: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_WEBSOCKET_PORT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

impl WebSocketConfig {
    /// Create a config for `host:port` with the default heartbeat.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Set the heartbeat interval.
    pub const fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }
}

/// SSE binding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Allowed cross-origin values. Empty disables CORS, `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// Path of the health endpoint.
    pub health_path: String,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_SSE_PORT,
            cors_origins: wildcard_origins(),
            health_path: DEFAULT_SSE_HEALTH_PATH.to_string(),
        }
    }
}

impl SseConfig {
    /// Create a config for `host:port` with the remaining fields defaulted.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }
}

/// Resolved transport configuration: exactly one variant per process run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Stdio binding.
    Stdio(StdioConfig),
    /// HTTP binding.
    Http(HttpConfig),
    /// WebSocket binding.
    #[serde(rename = "websocket")]
    WebSocket(WebSocketConfig),
    /// SSE binding.
    Sse(SseConfig),
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::Stdio(StdioConfig::default())
    }
}

impl TransportConfig {
    /// The active variant's kind.
    pub const fn kind(&self) -> TransportKind {
        match self {
            Self::Stdio(_) => TransportKind::Stdio,
            Self::Http(_) => TransportKind::Http,
            Self::WebSocket(_) => TransportKind::WebSocket,
            Self::Sse(_) => TransportKind::Sse,
        }
    }

    /// Defaults for `kind`.
    pub fn default_for(kind: TransportKind) -> Self {
        match kind {
            TransportKind::Stdio => Self::Stdio(StdioConfig::default()),
            TransportKind::Http => Self::Http(HttpConfig::default()),
            TransportKind::WebSocket => Self::WebSocket(WebSocketConfig::default()),
            TransportKind::Sse => Self::Sse(SseConfig::default()),
        }
    }

    /// `(host, port)` for network variants.
    pub fn bind_target(&self) -> Option<(&str, u16)> {
        match self {
            Self::Stdio(_) => None,
            Self::Http(c) => Some((c.host.as_str(), c.port)),
            Self::WebSocket(c) => Some((c.host.as_str(), c.port)),
            Self::Sse(c) => Some((c.host.as_str(), c.port)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_per_kind() {
        assert_eq!(
            TransportConfig::default_for(TransportKind::Http).bind_target(),
            Some(("0.0.0.0", 8000))
        );
        assert_eq!(
            TransportConfig::default_for(TransportKind::WebSocket).bind_target(),
            Some(("0.0.0.0", 8001))
        );
        assert_eq!(
            TransportConfig::default_for(TransportKind::Sse).bind_target(),
            Some(("0.0.0.0", 8003))
        );
        assert_eq!(TransportConfig::default().bind_target(), None);
    }

    #[test]
    fn test_kind_matches_variant() {
        for kind in TransportKind::ALL {
            assert_eq!(TransportConfig::default_for(kind).kind(), kind);
        }
    }

    #[test]
    fn test_serialized_tag() {
        let json = serde_json::to_value(TransportConfig::WebSocket(WebSocketConfig::default()))
            .expect("serialize");
        assert_eq!(json["type"], "websocket");
        assert_eq!(json["port"], 8001);
    }
}
