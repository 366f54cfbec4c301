//! Snapshot of the `MCP_*` environment.

use std::collections::HashMap;

/// Selects the transport kind.
pub const MCP_TRANSPORT: &str = "MCP_TRANSPORT";
/// HTTP bind host.
pub const MCP_HTTP_HOST: &str = "MCP_HTTP_HOST";
/// HTTP bind port.
pub const MCP_HTTP_PORT: &str = "MCP_HTTP_PORT";
/// Comma-separated HTTP CORS origins.
pub const MCP_HTTP_CORS_ORIGINS: &str = "MCP_HTTP_CORS_ORIGINS";
/// WebSocket bind host.
pub const MCP_WS_HOST: &str = "MCP_WS_HOST";
/// WebSocket bind port.
pub const MCP_WS_PORT: &str = "MCP_WS_PORT";
/// WebSocket heartbeat interval in seconds.
pub const MCP_WS_HEARTBEAT_INTERVAL: &str = "MCP_WS_HEARTBEAT_INTERVAL";
/// SSE bind host.
pub const MCP_SSE_HOST: &str = "MCP_SSE_HOST";
/// SSE bind port.
pub const MCP_SSE_PORT: &str = "MCP_SSE_PORT";
/// Comma-separated SSE CORS origins.
pub const MCP_SSE_CORS_ORIGINS: &str = "MCP_SSE_CORS_ORIGINS";
/// Log level.
pub const MCP_LOG_LEVEL: &str = "MCP_LOG_LEVEL";
/// Whether per-connection events are logged below `warn`.
pub const MCP_LOG_TRANSPORT_DETAILS: &str = "MCP_LOG_TRANSPORT_DETAILS";
/// Drain budget for graceful stop, in seconds.
pub const MCP_SHUTDOWN_TIMEOUT: &str = "MCP_SHUTDOWN_TIMEOUT";

const PREFIX: &str = "MCP_";

/// Environment variables captured once, so resolution never reads the process
/// environment itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvVars(HashMap<String, String>);

impl EnvVars {
    /// An empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture every `MCP_*` variable of the current process.
    ///
    /// Variables whose value is not valid unicode are skipped.
    pub fn from_process() -> Self {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .filter(|(k, _)| k.starts_with(PREFIX))
            .collect()
    }

    /// Set a variable, builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Raw value of `key`, exactly as set (possibly empty).
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Trimmed value of `key`; blank values count as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.raw(key).map(str::trim).filter(|v| !v.is_empty())
    }
}

impl<K, V> FromIterator<(K, V)> for EnvVars
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_blank_values_are_unset() {
        let env = EnvVars::new()
            .with(MCP_HTTP_HOST, "   ")
            .with(MCP_HTTP_PORT, " 9000 ");
        assert_eq!(env.get(MCP_HTTP_HOST), None);
        assert_eq!(env.raw(MCP_HTTP_HOST), Some("   "));
        assert_eq!(env.get(MCP_HTTP_PORT), Some("9000"));
        assert_eq!(env.get(MCP_WS_PORT), None);
    }

    #[test]
    #[serial]
    #[allow(unsafe_code)]
    fn test_from_process_keeps_only_prefixed() {
        // SAFETY: serialised with every other test that touches the environment.
        unsafe {
            std::env::set_var("MCP_TRANSPORT", "sse");
            std::env::set_var("GITMCP_UNRELATED", "1");
        }
        let env = EnvVars::from_process();
        unsafe {
            std::env::remove_var("MCP_TRANSPORT");
            std::env::remove_var("GITMCP_UNRELATED");
        }

        assert_eq!(env.get(MCP_TRANSPORT), Some("sse"));
        assert_eq!(env.raw("GITMCP_UNRELATED"), None);
    }
}
