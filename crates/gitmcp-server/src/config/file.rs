//! Structured config file loading.
//!
//! The file mirrors the environment layer under a `transport` table:
//!
//! ```toml
//! [transport]
//! type = "websocket"
//! shutdown_timeout = 5
//!
//! [transport.websocket]
//! port = 9001
//! heartbeat_interval = 15
//!
//! [transport.logging]
//! level = "debug"
//! ```
//!
//! Every key is optional. Values stay loosely typed here (ports are plain
//! integers, levels are strings) so range and token validation happens in the
//! resolver with the same errors as the other layers.

use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat};
use gitmcp_transport_traits::StdioFraming;
use serde::Deserialize;

use crate::error::ConfigError;

/// Root of a config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileConfig {
    /// The `transport` table.
    #[serde(default)]
    pub transport: FileTransport,
}

/// `transport.*` keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileTransport {
    /// `transport.type`
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// `transport.shutdown_timeout`, seconds
    pub shutdown_timeout: Option<i64>,
    /// `transport.stdio`
    pub stdio: Option<FileStdio>,
    /// `transport.http`
    pub http: Option<FileHttp>,
    /// `transport.websocket`
    pub websocket: Option<FileWebSocket>,
    /// `transport.sse`
    pub sse: Option<FileSse>,
    /// `transport.logging`
    pub logging: Option<FileLogging>,
}

/// `transport.stdio.*` keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileStdio {
    /// Input framing.
    pub framing: Option<StdioFraming>,
}

/// `transport.http.*` keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileHttp {
    /// Bind host.
    pub host: Option<String>,
    /// Bind port.
    pub port: Option<i64>,
    /// CORS origins.
    pub cors_origins: Option<Vec<String>>,
    /// Health route.
    pub health_check_path: Option<String>,
}

/// `transport.websocket.*` keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileWebSocket {
    /// Bind host.
    pub host: Option<String>,
    /// Bind port.
    pub port: Option<i64>,
    /// Heartbeat interval, seconds.
    pub heartbeat_interval: Option<i64>,
}

/// `transport.sse.*` keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileSse {
    /// Bind host.
    pub host: Option<String>,
    /// Bind port.
    pub port: Option<i64>,
    /// CORS origins.
    pub cors_origins: Option<Vec<String>>,
    /// Health route.
    pub health_check_path: Option<String>,
}

/// `transport.logging.*` keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileLogging {
    /// Log level.
    pub level: Option<String>,
    /// Whether per-connection events are logged below `warn`.
    pub transport_details: Option<bool>,
    /// JSON log lines.
    pub json: Option<bool>,
    /// Directory for a log file next to stderr output.
    pub directory: Option<PathBuf>,
}

impl FileConfig {
    /// Load a config file (TOML, YAML, or JSON)
    ///
    /// The format is chosen from the extension:
    /// - `.toml` → TOML
    /// - `.yaml` or `.yml` → YAML
    /// - `.json` → JSON
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file doesn't exist
    /// - The extension is not one of the above
    /// - The file cannot be parsed into the expected shape
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml" | "yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };
        let name = path
            .to_str()
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;

        let config = Config::builder()
            .add_source(File::new(name, format).required(true))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
