//! Layered configuration resolution.
//!
//! Three layers feed one [`TransportConfig`]: the `MCP_*` environment
//! ([`EnvVars`]), an optional config file ([`FileConfig`]) and command-line
//! overrides ([`CliOverrides`]). Each field is taken from the first layer that
//! sets it, in the order CLI, environment, file, built-in default.
//!
//! Resolution is pure: nothing here reads the process environment or the
//! filesystem, so every precedence rule is testable with plain values.

mod env;
mod file;

use std::time::Duration;

use gitmcp_transport_traits::{
    DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_HOST, DEFAULT_HTTP_HEALTH_PATH, DEFAULT_HTTP_PORT,
    DEFAULT_SSE_HEALTH_PATH, DEFAULT_SSE_PORT, DEFAULT_WEBSOCKET_PORT, HttpConfig, SseConfig,
    StdioConfig, TransportConfig, TransportKind, WebSocketConfig,
};

pub use env::{
    EnvVars, MCP_HTTP_CORS_ORIGINS, MCP_HTTP_HOST, MCP_HTTP_PORT, MCP_LOG_LEVEL,
    MCP_LOG_TRANSPORT_DETAILS, MCP_SHUTDOWN_TIMEOUT, MCP_SSE_CORS_ORIGINS, MCP_SSE_HOST,
    MCP_SSE_PORT, MCP_TRANSPORT, MCP_WS_HEARTBEAT_INTERVAL, MCP_WS_HOST, MCP_WS_PORT,
};
pub use file::{FileConfig, FileHttp, FileLogging, FileSse, FileStdio, FileTransport, FileWebSocket};

use crate::error::ConfigError;
use crate::logging::{LogLevel, LoggingSettings};

/// Drain budget used when no layer sets one.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Values given on the command line.
///
/// `host` and `port` apply to whichever network transport is resolved and are
/// ignored for stdio.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    /// `--transport`
    pub transport: Option<TransportKind>,
    /// `--host`
    pub host: Option<String>,
    /// `--port`
    pub port: Option<u16>,
    /// `--log-level`
    pub log_level: Option<LogLevel>,
    /// `--shutdown-timeout`, seconds
    pub shutdown_timeout: Option<u64>,
    /// `--log-json`
    pub log_json: bool,
}

/// Everything the server needs to run, resolved from all layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// The binding to instantiate.
    pub transport: TransportConfig,
    /// Logging setup.
    pub logging: LoggingSettings,
    /// Drain budget for graceful stop.
    pub shutdown_timeout: Duration,
}

/// Resolve the transport configuration.
///
/// # Errors
///
/// Returns a [`ConfigError`] naming the offending layer when a transport token,
/// port or heartbeat interval is invalid.
pub fn resolve(
    env: &EnvVars,
    file: Option<&FileConfig>,
    cli: Option<&CliOverrides>,
) -> Result<TransportConfig, ConfigError> {
    Layers::new(env, file, cli).transport()
}

/// Resolve the transport configuration plus logging and shutdown settings.
///
/// # Errors
///
/// Everything [`resolve`] rejects, plus invalid log levels and shutdown timeouts.
pub fn resolve_settings(
    env: &EnvVars,
    file: Option<&FileConfig>,
    cli: Option<&CliOverrides>,
) -> Result<ServerSettings, ConfigError> {
    let layers = Layers::new(env, file, cli);
    Ok(ServerSettings {
        transport: layers.transport()?,
        logging: layers.logging()?,
        shutdown_timeout: layers.shutdown_timeout()?,
    })
}

/// Borrowed view over the three layers.
struct Layers<'a> {
    env: &'a EnvVars,
    file: &'a FileTransport,
    cli: Option<&'a CliOverrides>,
}

static EMPTY_FILE: FileTransport = FileTransport {
    kind: None,
    shutdown_timeout: None,
    stdio: None,
    http: None,
    websocket: None,
    sse: None,
    logging: None,
};

impl<'a> Layers<'a> {
    fn new(env: &'a EnvVars, file: Option<&'a FileConfig>, cli: Option<&'a CliOverrides>) -> Self {
        Self {
            env,
            file: file.map_or(&EMPTY_FILE, |f| &f.transport),
            cli,
        }
    }

    fn kind(&self) -> Result<TransportKind, ConfigError> {
        if let Some(kind) = self.cli.and_then(|c| c.transport) {
            return Ok(kind);
        }
        if let Some(token) = self.env.get(MCP_TRANSPORT) {
            return parse_kind(token, MCP_TRANSPORT);
        }
        if let Some(token) = self.file.kind.as_deref() {
            return parse_kind(token, "transport.type");
        }
        Ok(TransportKind::Stdio)
    }

    fn transport(&self) -> Result<TransportConfig, ConfigError> {
        Ok(match self.kind()? {
            TransportKind::Stdio => TransportConfig::Stdio(StdioConfig {
                framing: self
                    .file
                    .stdio
                    .as_ref()
                    .and_then(|s| s.framing)
                    .unwrap_or_default(),
            }),
            TransportKind::Http => {
                let file = self.file.http.clone().unwrap_or_default();
                TransportConfig::Http(HttpConfig {
                    host: self.host(MCP_HTTP_HOST, file.host),
                    port: self.port(
                        MCP_HTTP_PORT,
                        file.port,
                        "transport.http.port",
                        DEFAULT_HTTP_PORT,
                    )?,
                    cors_origins: self.cors_origins(MCP_HTTP_CORS_ORIGINS, file.cors_origins),
                    health_path: file
                        .health_check_path
                        .unwrap_or_else(|| DEFAULT_HTTP_HEALTH_PATH.to_string()),
                })
            }
            TransportKind::WebSocket => {
                let file = self.file.websocket.clone().unwrap_or_default();
                TransportConfig::WebSocket(WebSocketConfig {
                    host: self.host(MCP_WS_HOST, file.host),
                    port: self.port(
                        MCP_WS_PORT,
                        file.port,
                        "transport.websocket.port",
                        DEFAULT_WEBSOCKET_PORT,
                    )?,
                    heartbeat_interval: self.heartbeat(file.heartbeat_interval)?,
                })
            }
            TransportKind::Sse => {
                let file = self.file.sse.clone().unwrap_or_default();
                TransportConfig::Sse(SseConfig {
                    host: self.host(MCP_SSE_HOST, file.host),
                    port: self.port(
                        MCP_SSE_PORT,
                        file.port,
                        "transport.sse.port",
                        DEFAULT_SSE_PORT,
                    )?,
                    cors_origins: self.cors_origins(MCP_SSE_CORS_ORIGINS, file.cors_origins),
                    health_path: file
                        .health_check_path
                        .unwrap_or_else(|| DEFAULT_SSE_HEALTH_PATH.to_string()),
                })
            }
        })
    }

    fn host(&self, env_key: &str, file: Option<String>) -> String {
        self.cli
            .and_then(|c| c.host.clone())
            .or_else(|| self.env.get(env_key).map(str::to_string))
            .or(file)
            .unwrap_or_else(|| DEFAULT_HOST.to_string())
    }

    fn port(
        &self,
        env_key: &str,
        file: Option<i64>,
        file_key: &str,
        default: u16,
    ) -> Result<u16, ConfigError> {
        if let Some(port) = self.cli.and_then(|c| c.port) {
            return check_port(i64::from(port), &port.to_string(), "--port");
        }
        if let Some(raw) = self.env.get(env_key) {
            let value = raw.parse::<i64>().map_err(|_| ConfigError::InvalidPort {
                origin: env_key.to_string(),
                value: raw.to_string(),
            })?;
            return check_port(value, raw, env_key);
        }
        match file {
            Some(value) => check_port(value, &value.to_string(), file_key),
            None => Ok(default),
        }
    }

    fn heartbeat(&self, file: Option<i64>) -> Result<Duration, ConfigError> {
        let (value, raw, origin) = if let Some(raw) = self.env.get(MCP_WS_HEARTBEAT_INTERVAL) {
            let invalid = || ConfigError::InvalidHeartbeat {
                origin: MCP_WS_HEARTBEAT_INTERVAL.to_string(),
                value: raw.to_string(),
            };
            (raw.parse::<i64>().map_err(|_| invalid())?, raw.to_string(), MCP_WS_HEARTBEAT_INTERVAL)
        } else if let Some(value) = file {
            (value, value.to_string(), "transport.websocket.heartbeat_interval")
        } else {
            return Ok(DEFAULT_HEARTBEAT_INTERVAL);
        };

        positive_secs(value).ok_or_else(|| ConfigError::InvalidHeartbeat {
            origin: origin.to_string(),
            value: raw,
        })
    }

    fn cors_origins(&self, env_key: &str, file: Option<Vec<String>>) -> Vec<String> {
        // Raw on purpose: an explicitly empty value disables CORS.
        if let Some(raw) = self.env.raw(env_key) {
            return split_origins(raw.split(','));
        }
        match file {
            Some(list) => split_origins(list.iter().map(String::as_str)),
            None => vec!["*".to_string()],
        }
    }

    fn logging(&self) -> Result<LoggingSettings, ConfigError> {
        let file = self.file.logging.clone().unwrap_or_default();

        let level = if let Some(level) = self.cli.and_then(|c| c.log_level) {
            level
        } else if let Some(raw) = self.env.get(MCP_LOG_LEVEL) {
            parse_level(raw, MCP_LOG_LEVEL)?
        } else if let Some(raw) = file.level.as_deref() {
            parse_level(raw, "transport.logging.level")?
        } else {
            LogLevel::default()
        };

        let transport_details = self
            .env
            .get(MCP_LOG_TRANSPORT_DETAILS)
            .map(parse_flag)
            .or(file.transport_details)
            .unwrap_or(true);

        let json = self.cli.is_some_and(|c| c.log_json) || file.json.unwrap_or(false);

        Ok(LoggingSettings {
            level,
            transport_details,
            json,
            directory: file.directory,
        })
    }

    fn shutdown_timeout(&self) -> Result<Duration, ConfigError> {
        let (value, raw, origin) = if let Some(secs) = self.cli.and_then(|c| c.shutdown_timeout) {
            (
                i64::try_from(secs).unwrap_or(i64::MAX),
                secs.to_string(),
                "--shutdown-timeout",
            )
        } else if let Some(raw) = self.env.get(MCP_SHUTDOWN_TIMEOUT) {
            let invalid = || ConfigError::InvalidTimeout {
                origin: MCP_SHUTDOWN_TIMEOUT.to_string(),
                value: raw.to_string(),
            };
            (raw.parse::<i64>().map_err(|_| invalid())?, raw.to_string(), MCP_SHUTDOWN_TIMEOUT)
        } else if let Some(value) = self.file.shutdown_timeout {
            (value, value.to_string(), "transport.shutdown_timeout")
        } else {
            return Ok(DEFAULT_SHUTDOWN_TIMEOUT);
        };

        positive_secs(value).ok_or_else(|| ConfigError::InvalidTimeout {
            origin: origin.to_string(),
            value: raw,
        })
    }
}

fn parse_kind(token: &str, origin: &str) -> Result<TransportKind, ConfigError> {
    token.parse().map_err(|_| ConfigError::InvalidTransport {
        origin: origin.to_string(),
        value: token.to_string(),
    })
}

fn parse_level(raw: &str, origin: &str) -> Result<LogLevel, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidLogLevel {
        origin: origin.to_string(),
        value: raw.to_string(),
    })
}

fn check_port(value: i64, raw: &str, origin: &str) -> Result<u16, ConfigError> {
    u16::try_from(value)
        .ok()
        .filter(|port| *port != 0)
        .ok_or_else(|| ConfigError::InvalidPort {
            origin: origin.to_string(),
            value: raw.to_string(),
        })
}

fn positive_secs(value: i64) -> Option<Duration> {
    u64::try_from(value)
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

fn parse_flag(raw: &str) -> bool {
    raw.eq_ignore_ascii_case("true") || raw == "1"
}

fn split_origins<'s>(entries: impl Iterator<Item = &'s str>) -> Vec<String> {
    entries
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn http(config: TransportConfig) -> HttpConfig {
        match config {
            TransportConfig::Http(http) => http,
            other => panic!("expected http, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_to_stdio() {
        let config = resolve(&EnvVars::new(), None, None).unwrap();
        assert_eq!(config, TransportConfig::Stdio(StdioConfig::default()));
    }

    #[test]
    fn test_cli_beats_env_beats_file() {
        let file = FileConfig {
            transport: FileTransport {
                kind: Some("http".to_string()),
                http: Some(FileHttp {
                    port: Some(8800),
                    host: Some("10.0.0.1".to_string()),
                    ..FileHttp::default()
                }),
                ..FileTransport::default()
            },
        };
        let env = EnvVars::new().with(MCP_HTTP_PORT, "9000");
        let cli = CliOverrides {
            port: Some(9100),
            ..CliOverrides::default()
        };

        let file_only = http(resolve(&EnvVars::new(), Some(&file), None).unwrap());
        assert_eq!((file_only.host.as_str(), file_only.port), ("10.0.0.1", 8800));

        let with_env = http(resolve(&env, Some(&file), None).unwrap());
        assert_eq!(with_env.port, 9000);
        assert_eq!(with_env.host, "10.0.0.1");

        let with_cli = http(resolve(&env, Some(&file), Some(&cli)).unwrap());
        assert_eq!(with_cli.port, 9100);
    }

    #[test]
    fn test_transport_token_layers() {
        let env = EnvVars::new().with(MCP_TRANSPORT, " WS ");
        assert_eq!(resolve(&env, None, None).unwrap().kind(), TransportKind::WebSocket);

        let cli = CliOverrides {
            transport: Some(TransportKind::Sse),
            ..CliOverrides::default()
        };
        assert_eq!(resolve(&env, None, Some(&cli)).unwrap().kind(), TransportKind::Sse);

        let bad = EnvVars::new().with(MCP_TRANSPORT, "grpc");
        let err = resolve(&bad, None, None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTransport { ref value, .. } if value == "grpc"));
    }

    #[test]
    fn test_port_validation() {
        for bad in ["0", "65536", "-1", "http"] {
            let env = EnvVars::new()
                .with(MCP_TRANSPORT, "http")
                .with(MCP_HTTP_PORT, bad);
            assert!(
                matches!(resolve(&env, None, None), Err(ConfigError::InvalidPort { .. })),
                "{bad} accepted"
            );
        }

        let cli = CliOverrides {
            transport: Some(TransportKind::Http),
            port: Some(0),
            ..CliOverrides::default()
        };
        assert!(matches!(
            resolve(&EnvVars::new(), None, Some(&cli)),
            Err(ConfigError::InvalidPort { ref origin, .. }) if origin == "--port"
        ));
    }

    #[test]
    fn test_cli_host_and_port_ignored_for_stdio() {
        let cli = CliOverrides {
            host: Some("127.0.0.1".to_string()),
            port: Some(0),
            ..CliOverrides::default()
        };
        assert_eq!(
            resolve(&EnvVars::new(), None, Some(&cli)).unwrap().kind(),
            TransportKind::Stdio
        );
    }

    #[test]
    fn test_websocket_heartbeat() {
        let env = EnvVars::new()
            .with(MCP_TRANSPORT, "websocket")
            .with(MCP_WS_HEARTBEAT_INTERVAL, "12");
        let TransportConfig::WebSocket(ws) = resolve(&env, None, None).unwrap() else {
            panic!("expected websocket");
        };
        assert_eq!(ws.heartbeat_interval, Duration::from_secs(12));
        assert_eq!(ws.port, DEFAULT_WEBSOCKET_PORT);

        for bad in ["0", "-5", "soon"] {
            let env = EnvVars::new()
                .with(MCP_TRANSPORT, "websocket")
                .with(MCP_WS_HEARTBEAT_INTERVAL, bad);
            assert!(matches!(
                resolve(&env, None, None),
                Err(ConfigError::InvalidHeartbeat { .. })
            ));
        }
    }

    #[test]
    fn test_cors_origin_lists() {
        let env = EnvVars::new()
            .with(MCP_TRANSPORT, "sse")
            .with(MCP_SSE_CORS_ORIGINS, " https://a.example , ,https://b.example");
        let TransportConfig::Sse(sse) = resolve(&env, None, None).unwrap() else {
            panic!("expected sse");
        };
        assert_eq!(sse.cors_origins, vec!["https://a.example", "https://b.example"]);
        assert_eq!(sse.port, DEFAULT_SSE_PORT);
        assert_eq!(sse.health_path, "/healthz");

        let disabled = EnvVars::new()
            .with(MCP_TRANSPORT, "http")
            .with(MCP_HTTP_CORS_ORIGINS, "");
        assert!(http(resolve(&disabled, None, None).unwrap()).cors_origins.is_empty());

        let defaulted = EnvVars::new().with(MCP_TRANSPORT, "http");
        assert_eq!(http(resolve(&defaulted, None, None).unwrap()).cors_origins, vec!["*"]);
    }

    #[test]
    fn test_settings_logging_and_timeout() {
        let file = FileConfig {
            transport: FileTransport {
                shutdown_timeout: Some(3),
                logging: Some(FileLogging {
                    level: Some("debug".to_string()),
                    transport_details: Some(true),
                    ..FileLogging::default()
                }),
                ..FileTransport::default()
            },
        };
        let env = EnvVars::new()
            .with(MCP_LOG_LEVEL, "WARNING")
            .with(MCP_LOG_TRANSPORT_DETAILS, "false");

        let settings = resolve_settings(&env, Some(&file), None).unwrap();
        assert_eq!(settings.logging.level, LogLevel::Warn);
        assert!(!settings.logging.transport_details);
        assert_eq!(settings.shutdown_timeout, Duration::from_secs(3));

        let cli = CliOverrides {
            log_level: Some(LogLevel::Trace),
            shutdown_timeout: Some(20),
            log_json: true,
            ..CliOverrides::default()
        };
        let settings = resolve_settings(&env, Some(&file), Some(&cli)).unwrap();
        assert_eq!(settings.logging.level, LogLevel::Trace);
        assert!(settings.logging.json);
        assert_eq!(settings.shutdown_timeout, Duration::from_secs(20));

        let defaults = resolve_settings(&EnvVars::new(), None, None).unwrap();
        assert_eq!(defaults.shutdown_timeout, DEFAULT_SHUTDOWN_TIMEOUT);
        assert_eq!(defaults.logging.level, LogLevel::Info);
        assert!(defaults.logging.transport_details);
    }

    #[test]
    fn test_settings_validation() {
        let env = EnvVars::new().with(MCP_LOG_LEVEL, "loud");
        assert!(matches!(
            resolve_settings(&env, None, None),
            Err(ConfigError::InvalidLogLevel { .. })
        ));

        let env = EnvVars::new().with(MCP_SHUTDOWN_TIMEOUT, "0");
        assert!(matches!(
            resolve_settings(&env, None, None),
            Err(ConfigError::InvalidTimeout { .. })
        ));
    }
}
