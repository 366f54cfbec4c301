//! Server error types.

use std::io;
use std::path::PathBuf;

use gitmcp_transport_traits::TransportError;
use thiserror::Error;

/// Result type alias for server operations.
pub type ServerResult<T> = std::result::Result<T, ServerError>;

/// Errors raised while resolving the effective configuration.
///
/// `origin` fields name the layer the bad value came from (an environment
/// variable, `--port`, or a config-file key) so the message points at what to fix.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The transport token does not name a known binding.
    #[error("Invalid transport '{value}' from {origin} (expected one of: stdio, http, websocket, sse)")]
    InvalidTransport {
        /// Where the value came from
        origin: String,
        /// The offending token
        value: String,
    },

    /// A port is not an integer in `1..=65535`.
    #[error("Invalid port '{value}' from {origin}: expected an integer between 1 and 65535")]
    InvalidPort {
        /// Where the value came from
        origin: String,
        /// The offending value
        value: String,
    },

    /// A heartbeat interval is not a positive integer number of seconds.
    #[error("Invalid heartbeat interval '{value}' from {origin}: expected a positive number of seconds")]
    InvalidHeartbeat {
        /// Where the value came from
        origin: String,
        /// The offending value
        value: String,
    },

    /// A log level is not one of trace, debug, info, warn, error.
    #[error("Invalid log level '{value}' from {origin}")]
    InvalidLogLevel {
        /// Where the value came from
        origin: String,
        /// The offending value
        value: String,
    },

    /// A shutdown timeout is not a positive integer number of seconds.
    #[error("Invalid shutdown timeout '{value}' from {origin}: expected a positive number of seconds")]
    InvalidTimeout {
        /// Where the value came from
        origin: String,
        /// The offending value
        value: String,
    },

    /// The config file does not exist.
    #[error("Configuration file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The config file extension is not one of toml, yaml, yml, json.
    #[error("Unsupported configuration file format: {}. Use .toml, .yaml, .yml, or .json", .0.display())]
    UnsupportedFormat(PathBuf),

    /// The config file could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] config::ConfigError),
}

/// Top-level errors of the server runtime.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServerError {
    /// Configuration could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The binding failed to start or stop.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A signal handler could not be installed.
    #[error("Failed to install signal handler: {0}")]
    Signal(#[source] io::Error),
}

impl ServerError {
    /// Whether this error is a startup failure the process should exit on.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Config(_) | Self::Signal(_) => true,
            Self::Transport(e) => e.is_fatal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitmcp_transport_traits::TransportKind;

    #[test]
    fn test_config_error_names_source() {
        let err = ConfigError::InvalidPort {
            origin: "MCP_HTTP_PORT".to_string(),
            value: "eighty".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid port 'eighty' from MCP_HTTP_PORT: expected an integer between 1 and 65535"
        );
    }

    #[test]
    fn test_fatal_classification() {
        let config: ServerError = ConfigError::FileNotFound(PathBuf::from("missing.toml")).into();
        assert!(config.is_fatal());

        let unsupported: ServerError =
            TransportError::UnsupportedTransport(TransportKind::Sse).into();
        assert!(unsupported.is_fatal());

        let handler: ServerError = TransportError::Handler("boom".to_string()).into();
        assert!(!handler.is_fatal());
    }
}
